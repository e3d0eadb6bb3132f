use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use tracing::info;

use carte_core::{
    DocumentStore, ImageStore,
    config::AppConfig,
    store::{open_document_store, open_image_store},
};

use crate::menu::service::MenuService;

#[derive(Clone, Debug, Serialize)]
pub struct ServerMetadata {
    pub name: &'static str,
    pub version: &'static str,
    pub document_store: &'static str,
}

#[derive(Clone)]
pub struct AppState {
    pub menu_service: Arc<MenuService>,
    pub metadata: ServerMetadata,
}

/// Builds the shared state from configuration, opening the configured stores.
pub fn build_state(config: &AppConfig) -> Result<AppState> {
    let documents = open_document_store(config)?;
    let images = open_image_store(config);
    info!(
        document_store = documents.backend(),
        image_store = ?config.image_store_backend,
        "opened menu stores"
    );

    Ok(build_state_with_stores(documents, images))
}

pub fn build_state_with_stores(
    documents: Arc<dyn DocumentStore>,
    images: Arc<dyn ImageStore>,
) -> AppState {
    let metadata = ServerMetadata {
        name: "carte",
        version: env!("CARGO_PKG_VERSION"),
        document_store: documents.backend(),
    };

    AppState {
        menu_service: Arc::new(MenuService::new(documents, images)),
        metadata,
    }
}

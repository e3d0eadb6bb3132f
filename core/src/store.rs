use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use reqwest::Client;

use crate::{
    config::{AppConfig, DocumentStoreBackend, ImageStoreBackend},
    document_store::DocumentStore,
    image::ImageStore,
};

pub mod github;
pub mod images;
pub mod local;
pub mod memory;

use self::{
    github::GithubDocumentStore,
    images::{FsImageStore, InMemoryImageStore},
    local::LocalFileDocumentStore,
    memory::InMemoryDocumentStore,
};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const USER_AGENT: &str = concat!("carte/", env!("CARGO_PKG_VERSION"));

pub fn http_client() -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(HTTP_TIMEOUT)
        .connect_timeout(HTTP_CONNECT_TIMEOUT)
        .build()
        .context("build http client")
}

/// Builds the document store selected by `config.document_store_backend`.
pub fn open_document_store(config: &AppConfig) -> Result<Arc<dyn DocumentStore>> {
    let store: Arc<dyn DocumentStore> = match config.document_store_backend {
        DocumentStoreBackend::Local => {
            Arc::new(LocalFileDocumentStore::new(&config.menu_file_path))
        }
        DocumentStoreBackend::Github => Arc::new(GithubDocumentStore::new(
            http_client()?,
            config.github.clone(),
        )?),
        DocumentStoreBackend::Memory => Arc::new(InMemoryDocumentStore::default()),
    };

    Ok(store)
}

pub fn open_image_store(config: &AppConfig) -> Arc<dyn ImageStore> {
    match config.image_store_backend {
        ImageStoreBackend::Filesystem => Arc::new(FsImageStore::new(&config.image_dir)),
        ImageStoreBackend::Memory => Arc::new(InMemoryImageStore::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn github_store_requires_token() {
        let mut config = AppConfig::default();
        config.document_store_backend = DocumentStoreBackend::Github;
        config.github.repository = Some("acme/menus".into());

        let err = open_document_store(&config).err().expect("missing token fails");
        assert!(err.to_string().contains("token"));
    }

    #[tokio::test]
    async fn memory_backends_start_empty() {
        let mut config = AppConfig::default();
        config.document_store_backend = DocumentStoreBackend::Memory;
        config.image_store_backend = ImageStoreBackend::Memory;

        let store = open_document_store(&config).expect("open memory store");
        assert_eq!(store.backend(), "memory");
        assert!(store.load().await.expect("load").is_empty());

        let images = open_image_store(&config);
        assert!(images.get("missing.png").await.expect("get").is_none());
    }
}

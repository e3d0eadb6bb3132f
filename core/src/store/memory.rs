use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{document_store::DocumentStore, menu::MenuDocument};

/// Naive in-memory document store used for local development and tests.
#[derive(Default)]
pub struct InMemoryDocumentStore {
    inner: RwLock<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    document: MenuDocument,
    revision: u64,
    changes: Vec<String>,
}

impl InMemoryDocumentStore {
    pub fn with_document(document: MenuDocument) -> Self {
        Self {
            inner: RwLock::new(MemoryState {
                document,
                ..MemoryState::default()
            }),
        }
    }

    /// Number of successful saves so far.
    pub async fn revision(&self) -> u64 {
        self.inner.read().await.revision
    }

    /// Change descriptions in the order they were saved.
    pub async fn changes(&self) -> Vec<String> {
        self.inner.read().await.changes.clone()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn load(&self) -> Result<MenuDocument> {
        Ok(self.inner.read().await.document.clone())
    }

    async fn save(&self, document: &MenuDocument, change_description: &str) -> Result<()> {
        let mut state = self.inner.write().await;
        state.document = document.clone();
        state.revision += 1;
        state.changes.push(change_description.to_owned());
        Ok(())
    }
}

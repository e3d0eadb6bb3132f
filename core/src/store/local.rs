use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use crate::{document_store::DocumentStore, menu::MenuDocument};

/// Menu document kept in a single JSON file on local disk.
///
/// Writes truncate and rewrite the file in place. There is no version check,
/// so concurrent writers from separate processes overwrite each other.
pub struct LocalFileDocumentStore {
    path: PathBuf,
}

impl LocalFileDocumentStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes an empty document if the file does not exist yet. Returns
    /// whether a file was created.
    pub async fn ensure_initialized(&self) -> Result<bool> {
        if fs::try_exists(&self.path)
            .await
            .with_context(|| format!("failed to inspect menu file: {}", self.path.display()))?
        {
            return Ok(false);
        }

        self.write(&MenuDocument::new()).await?;
        Ok(true)
    }

    async fn write(&self, document: &MenuDocument) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.with_context(|| {
                format!("failed to create menu directory: {}", parent.display())
            })?;
        }

        let bytes = document
            .to_pretty_json()
            .context("failed to encode menu document")?;
        fs::write(&self.path, bytes)
            .await
            .with_context(|| format!("failed to write menu file: {}", self.path.display()))
    }
}

#[async_trait]
impl DocumentStore for LocalFileDocumentStore {
    fn backend(&self) -> &'static str {
        "local"
    }

    async fn load(&self) -> Result<MenuDocument> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "menu file missing, starting empty");
                return Ok(MenuDocument::new());
            }
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("failed to read menu file: {}", self.path.display())
                });
            }
        };

        MenuDocument::from_json(&bytes)
            .with_context(|| format!("malformed menu document: {}", self.path.display()))
    }

    async fn save(&self, document: &MenuDocument, change_description: &str) -> Result<()> {
        self.write(document).await?;
        debug!(
            path = %self.path.display(),
            restaurants = document.len(),
            change = change_description,
            "menu document written"
        );
        Ok(())
    }
}

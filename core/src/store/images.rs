use std::{
    collections::HashMap,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::{fs, sync::RwLock};
use tracing::debug;

use crate::image::{
    ImageStore, StoredImage, generate_image_name, image_public_path, is_valid_image_name,
};

/// Images written as plain files into one directory.
pub struct FsImageStore {
    root: PathBuf,
}

impl FsImageStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn ensure_initialized(&self) -> Result<()> {
        fs::create_dir_all(&self.root).await.with_context(|| {
            format!("failed to create image directory: {}", self.root.display())
        })
    }
}

#[async_trait]
impl ImageStore for FsImageStore {
    async fn save(&self, content: &[u8], original_filename: &str) -> Result<String> {
        self.ensure_initialized().await?;

        let name = generate_image_name(original_filename);
        let path = self.root.join(&name);
        fs::write(&path, content)
            .await
            .with_context(|| format!("failed to write image: {}", path.display()))?;

        debug!(
            path = %path.display(),
            size = content.len(),
            original = original_filename,
            "image stored"
        );
        Ok(image_public_path(&name))
    }

    async fn get(&self, filename: &str) -> Result<Option<StoredImage>> {
        if !is_valid_image_name(filename) {
            return Ok(None);
        }

        let path = self.root.join(filename);
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(StoredImage::from_bytes(bytes))),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => {
                Err(err).with_context(|| format!("failed to read image: {}", path.display()))
            }
        }
    }
}

/// Naive in-memory image storage used for local development and tests.
#[derive(Default)]
pub struct InMemoryImageStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryImageStore {
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[async_trait]
impl ImageStore for InMemoryImageStore {
    async fn save(&self, content: &[u8], original_filename: &str) -> Result<String> {
        let name = generate_image_name(original_filename);
        self.entries
            .write()
            .await
            .insert(name.clone(), content.to_vec());
        Ok(image_public_path(&name))
    }

    async fn get(&self, filename: &str) -> Result<Option<StoredImage>> {
        let entries = self.entries.read().await;
        Ok(entries.get(filename).cloned().map(StoredImage::from_bytes))
    }
}

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

/// Route prefix under which stored images are served.
pub const IMAGE_ROUTE_PREFIX: &str = "/images/";

/// Upper bound for image filenames to avoid unbounded allocations and traversal attempts.
const MAX_IMAGE_NAME_LEN: usize = 128;

/// Longer extensions are dropped so generated names stay servable.
const MAX_IMAGE_EXTENSION_LEN: usize = 16;

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Image bytes as read back from a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

impl StoredImage {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let content_type = sniff_mime(&bytes);
        Self {
            bytes,
            content_type,
        }
    }
}

/// Storage for uploaded item images.
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Stores `content` under a fresh unique name that keeps the extension of
    /// `original_filename`, returning the public path of the image.
    async fn save(&self, content: &[u8], original_filename: &str) -> Result<String>;

    /// Looks up an image by the filename part of its public path.
    async fn get(&self, filename: &str) -> Result<Option<StoredImage>>;
}

/// `<uuid>.<ext>`, or a bare uuid when the upload had no usable extension.
pub fn generate_image_name(original_filename: &str) -> String {
    let id = Uuid::new_v4();
    match image_extension(original_filename) {
        Some(ext) => format!("{id}.{ext}"),
        None => id.to_string(),
    }
}

pub fn image_public_path(filename: &str) -> String {
    format!("{IMAGE_ROUTE_PREFIX}{filename}")
}

pub fn is_valid_image_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_IMAGE_NAME_LEN
        && !name.starts_with('.')
        && name
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.'))
}

fn image_extension(original_filename: &str) -> Option<String> {
    Path::new(original_filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| {
            !ext.is_empty()
                && ext.len() <= MAX_IMAGE_EXTENSION_LEN
                && ext.chars().all(|ch| ch.is_ascii_alphanumeric())
        })
        .map(|ext| ext.to_owned())
}

pub fn sniff_mime(bytes: &[u8]) -> String {
    infer::get(bytes)
        .map(|kind| kind.mime_type().to_owned())
        .unwrap_or_else(|| FALLBACK_CONTENT_TYPE.to_owned())
}

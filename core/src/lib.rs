pub mod config;
pub mod document_store;
pub mod ids;
pub mod image;
pub mod menu;
pub mod store;

pub use document_store::{DocumentStore, VersionConflict, is_version_conflict};
pub use image::{ImageStore, StoredImage};
pub use menu::{Category, Item, MenuDocument, MenuError, NewItem, Restaurant};

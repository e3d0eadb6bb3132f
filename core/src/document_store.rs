use std::{error::Error as StdError, fmt};

use anyhow::{Error as AnyError, Result};
use async_trait::async_trait;

use crate::menu::MenuDocument;

/// Persistence for the single menu document.
///
/// Implementations always read and write the document as a whole; nothing is
/// cached between calls.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Human readable backend name, used in logs.
    fn backend(&self) -> &'static str;

    async fn load(&self) -> Result<MenuDocument>;

    async fn save(&self, document: &MenuDocument, change_description: &str) -> Result<()>;
}

/// The stored document moved on between reading its version token and
/// submitting a write keyed to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionConflict {
    pub backend: &'static str,
    pub detail: String,
}

impl VersionConflict {
    pub fn new(backend: &'static str, detail: impl Into<String>) -> Self {
        Self {
            backend,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for VersionConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} rejected the write because the menu document changed: {}",
            self.backend, self.detail
        )
    }
}

impl StdError for VersionConflict {}

/// Returns `true` if any cause in the chain is a [`VersionConflict`].
pub fn is_version_conflict(err: &AnyError) -> bool {
    err.chain()
        .any(|cause| cause.downcast_ref::<VersionConflict>().is_some())
}

#[cfg(test)]
mod tests {
    use anyhow::{Context, anyhow};

    use super::*;

    #[test]
    fn detects_conflict_through_context() {
        let err: AnyError = Err::<(), _>(VersionConflict::new("github", "sha mismatch"))
            .context("save menu document")
            .unwrap_err();
        assert!(is_version_conflict(&err));
        assert!(format!("{err:#}").contains("sha mismatch"));
    }

    #[test]
    fn plain_errors_are_not_conflicts() {
        assert!(!is_version_conflict(&anyhow!("connection refused")));
    }
}

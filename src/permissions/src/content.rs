//! Content provider seam
//!
//! The resolver never performs I/O itself; dataset text is supplied by a
//! [`ContentProvider`] before the index build runs.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

use crate::error::{PermissionsError, Result};

/// Supplies raw dataset documents by path
#[async_trait]
pub trait ContentProvider: Send + Sync {
    /// Read the document at `path` as text
    async fn read(&self, path: &str) -> Result<String>;
}

/// Reads documents from a directory on local disk
#[derive(Debug, Clone)]
pub struct FileContentProvider {
    root: PathBuf,
}

impl FileContentProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves `path` under the root, refusing anything that escapes it
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path.trim_start_matches('/'));
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if path.trim().is_empty() || escapes {
            return Err(PermissionsError::InvalidArgument(format!(
                "content path '{}' must be relative to the content root",
                path
            )));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ContentProvider for FileContentProvider {
    async fn read(&self, path: &str) -> Result<String> {
        let full_path = self.resolve(path)?;
        debug!(path = %full_path.display(), "reading content");
        tokio::fs::read_to_string(&full_path).await.map_err(|e| {
            PermissionsError::Content(format!("failed to read '{}': {}", full_path.display(), e))
        })
    }
}

/// Serves documents from memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryContentProvider {
    documents: HashMap<String, String>,
}

impl InMemoryContentProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a document under `path`
    pub fn with_document(mut self, path: impl Into<String>, text: impl Into<String>) -> Self {
        self.documents.insert(path.into(), text.into());
        self
    }
}

#[async_trait]
impl ContentProvider for InMemoryContentProvider {
    async fn read(&self, path: &str) -> Result<String> {
        self.documents
            .get(path)
            .cloned()
            .ok_or_else(|| PermissionsError::Content(format!("no document at '{}'", path)))
    }
}

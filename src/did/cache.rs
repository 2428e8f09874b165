//! Local DID document cache
//!
//! Sign-in stores the claimed app-instance document so that response tokens
//! signed by that DID can be verified later without a network lookup.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

use super::{parse_did, DidDocument, DidError};

#[async_trait]
pub trait DocumentCache: Send + Sync {
    /// Store (or replace) a document under its subject DID
    async fn store(&self, document: &DidDocument) -> Result<(), DidError>;

    /// Load a previously stored document
    async fn load(&self, did: &str) -> Result<Option<DidDocument>, DidError>;
}

/// Documents stored as JSON files under a data directory
#[derive(Debug, Clone)]
pub struct FsDocumentCache {
    root: PathBuf,
}

impl FsDocumentCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/<method>-<method-specific-id>.json`, with path-unsafe
    /// characters replaced
    fn path_for(&self, did: &str) -> Result<PathBuf, DidError> {
        let (method, id) = parse_did(did)?;
        let safe: String = id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        Ok(self.root.join(format!("{}-{}.json", method, safe)))
    }
}

#[async_trait]
impl DocumentCache for FsDocumentCache {
    async fn store(&self, document: &DidDocument) -> Result<(), DidError> {
        let path = self.path_for(&document.id)?;
        let json = serde_json::to_vec_pretty(document).map_err(|e| DidError::Cache(e.to_string()))?;

        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| DidError::Cache(format!("{}: {}", self.root.display(), e)))?;
        tokio::fs::write(&path, json)
            .await
            .map_err(|e| DidError::Cache(format!("{}: {}", path.display(), e)))?;

        debug!(did = %document.id, path = %path.display(), "Cached DID document");
        Ok(())
    }

    async fn load(&self, did: &str) -> Result<Option<DidDocument>, DidError> {
        let path = self.path_for(did)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(DidError::Cache(format!("{}: {}", path.display(), e))),
        };

        let document: DidDocument =
            serde_json::from_slice(&bytes).map_err(|e| DidError::Cache(e.to_string()))?;

        // Sanitised names can collide; never hand back another DID's document
        if document.id != did {
            return Ok(None);
        }
        Ok(Some(document))
    }
}

/// In-memory document cache
#[derive(Debug, Default)]
pub struct MemoryDocumentCache {
    documents: DashMap<String, DidDocument>,
}

impl MemoryDocumentCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Seed a document without going through the async trait
    pub fn insert(&self, document: &DidDocument) {
        self.documents.insert(document.id.clone(), document.clone());
    }
}

#[async_trait]
impl DocumentCache for MemoryDocumentCache {
    async fn store(&self, document: &DidDocument) -> Result<(), DidError> {
        self.documents.insert(document.id.clone(), document.clone());
        Ok(())
    }

    async fn load(&self, did: &str) -> Result<Option<DidDocument>, DidError> {
        Ok(self.documents.get(did).map(|d| d.value().clone()))
    }
}

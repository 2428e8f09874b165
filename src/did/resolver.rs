//! DID Resolution Service
//!
//! Resolves DIDs to their documents for signature verification.
//!
//! By method:
//! - `did:key` decoded locally (self-describing)
//! - `did:web` from the in-memory TTL cache, else fetched over HTTPS
//! - anything else from the local document cache (documents recorded at
//!   sign-in), unless only published documents are acceptable
//!
//! A `did:web` DID is never answered from the sign-in cache.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::debug;

use super::{parse_did, DidDocument, DidError, DocumentCache};

/// Configuration for the DID resolver
#[derive(Debug, Clone)]
pub struct DidResolverConfig {
    /// Cache TTL for fetched DID documents (default: 5 minutes)
    pub cache_ttl: Duration,
    /// Timeout for HTTP requests (default: 5 seconds)
    pub request_timeout: Duration,
    /// Maximum cache entries (default: 1000)
    pub max_cache_entries: usize,
}

impl Default for DidResolverConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(300),
            request_timeout: Duration::from_secs(5),
            max_cache_entries: 1000,
        }
    }
}

struct CachedDocument {
    document: DidDocument,
    expires_at: Instant,
}

pub struct DidResolver {
    config: DidResolverConfig,
    cache: RwLock<HashMap<String, CachedDocument>>,
    documents: Arc<dyn DocumentCache>,
    http_client: reqwest::Client,
}

impl DidResolver {
    pub fn new(documents: Arc<dyn DocumentCache>) -> Self {
        Self::with_config(documents, DidResolverConfig::default())
    }

    pub fn with_config(documents: Arc<dyn DocumentCache>, config: DidResolverConfig) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("vault-node/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();

        Self {
            config,
            cache: RwLock::new(HashMap::new()),
            documents,
            http_client,
        }
    }

    /// Resolve a DID to its DID Document
    pub async fn resolve(&self, did: &str) -> Result<DidDocument, DidError> {
        self.resolve_from(did, true).await
    }

    /// Resolve from published sources only (`did:key`, `did:web`); documents
    /// recorded at sign-in are self-asserted and never consulted.
    pub async fn resolve_published(&self, did: &str) -> Result<DidDocument, DidError> {
        self.resolve_from(did, false).await
    }

    async fn resolve_from(&self, did: &str, recorded: bool) -> Result<DidDocument, DidError> {
        let (method, _) = parse_did(did)?;

        match method {
            "key" => DidDocument::from_did_key(did),
            "web" => {
                if let Some(doc) = self.get_cached(did).await {
                    debug!(did = %did, "DID resolved from cache");
                    return Ok(doc);
                }
                let document = self.resolve_did_web(did).await?;
                self.cache_document(did, document.clone()).await;
                Ok(document)
            }
            _ if recorded => {
                let document = self.documents.load(did).await?.ok_or_else(|| {
                    DidError::ResolutionFailed(format!("no document known for {}", did))
                })?;
                debug!(did = %did, "DID resolved from local document cache");
                Ok(document)
            }
            other => Err(DidError::UnsupportedMethod(format!(
                "did:{} has no published document ({})",
                other, did
            ))),
        }
    }

    async fn get_cached(&self, did: &str) -> Option<DidDocument> {
        let cache = self.cache.read().await;
        cache.get(did).and_then(|cached| {
            if cached.expires_at > Instant::now() {
                Some(cached.document.clone())
            } else {
                None
            }
        })
    }

    async fn cache_document(&self, did: &str, document: DidDocument) {
        let mut cache = self.cache.write().await;

        if cache.len() >= self.config.max_cache_entries {
            cache.retain(|_, v| v.expires_at > Instant::now());

            // Still full: drop half
            if cache.len() >= self.config.max_cache_entries {
                let to_remove: Vec<_> = cache.keys().take(cache.len() / 2).cloned().collect();
                for key in to_remove {
                    cache.remove(&key);
                }
            }
        }

        cache.insert(
            did.to_string(),
            CachedDocument {
                document,
                expires_at: Instant::now() + self.config.cache_ttl,
            },
        );
    }

    /// did:web:example.com → https://example.com/.well-known/did.json
    /// did:web:example.com:path:to → https://example.com/path/to/did.json
    async fn resolve_did_web(&self, did: &str) -> Result<DidDocument, DidError> {
        let url = did_web_to_url(did)?;
        debug!(did = %did, url = %url, "Resolving did:web");

        let response = self
            .http_client
            .get(&url)
            .header("Accept", "application/did+ld+json, application/json")
            .send()
            .await
            .map_err(|e| DidError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(DidError::ResolutionFailed(format!(
                "HTTP {} from {}",
                response.status(),
                url
            )));
        }

        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| DidError::InvalidDocument(e.to_string()))?;
        let document = DidDocument::from_value(&value)?;

        // Keys from a document about another DID must never verify this one
        if document.id != did {
            return Err(DidError::InvalidDocument(format!(
                "document id {} does not match {}",
                document.id, did
            )));
        }

        Ok(document)
    }

}

/// Convert a did:web DID to its resolution URL
fn did_web_to_url(did: &str) -> Result<String, DidError> {
    let without_prefix = did
        .strip_prefix("did:web:")
        .ok_or_else(|| DidError::InvalidDid("Missing did:web: prefix".to_string()))?;

    let parts: Vec<&str> = without_prefix.split(':').collect();
    if parts[0].is_empty() {
        return Err(DidError::InvalidDid("Empty domain in did:web".to_string()));
    }

    // Port separators are percent-encoded in the domain
    let domain = parts[0].replace("%3A", ":");

    let path = if parts.len() > 1 {
        format!("/{}/did.json", parts[1..].join("/"))
    } else {
        "/.well-known/did.json".to_string()
    };

    Ok(format!("https://{domain}{path}"))
}

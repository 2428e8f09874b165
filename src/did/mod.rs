//! DID layer
//!
//! Documents, credentials and presentations, compact JWS tokens, the local
//! document cache and DID resolution. Everything the auth engine needs from
//! the DID world goes through the [`DidToolkit`] capability set.

pub mod cache;
pub mod credential;
pub mod document;
pub mod key;
pub mod resolver;
pub mod token;
pub mod toolkit;

pub use cache::{DocumentCache, FsDocumentCache, MemoryDocumentCache};
pub use credential::{Credential, Presentation};
pub use document::{DidDocument, Service, VerificationMethod};
pub use resolver::{DidResolver, DidResolverConfig};
pub use token::{ParsedToken, TokenClaims};
pub use toolkit::{DidToolkit, JwsToolkit};

use crate::types::VaultError;

/// Errors from the DID layer
#[derive(Debug, thiserror::Error)]
pub enum DidError {
    #[error("Invalid DID: {0}")]
    InvalidDid(String),

    #[error("Unsupported DID method: {0}")]
    UnsupportedMethod(String),

    #[error("Invalid DID document: {0}")]
    InvalidDocument(String),

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Token has expired")]
    TokenExpired,

    #[error("Invalid credential: {0}")]
    InvalidCredential(String),

    #[error("Invalid presentation: {0}")]
    InvalidPresentation(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Resolution failed: {0}")]
    ResolutionFailed(String),

    #[error("Document cache error: {0}")]
    Cache(String),

    #[error("Signing failed: {0}")]
    Signing(String),
}

impl From<DidError> for VaultError {
    fn from(err: DidError) -> Self {
        match err {
            DidError::Signing(_) | DidError::Cache(_) => VaultError::Internal(err.to_string()),
            _ => VaultError::BadRequest(err.to_string()),
        }
    }
}

/// Split a DID into `(method, method-specific id)`
pub fn parse_did(did: &str) -> Result<(&str, &str), DidError> {
    let rest = did
        .strip_prefix("did:")
        .ok_or_else(|| DidError::InvalidDid(format!("{} does not start with did:", did)))?;
    let (method, id) = rest
        .split_once(':')
        .ok_or_else(|| DidError::InvalidDid(format!("{} has no method-specific id", did)))?;

    if method.is_empty() || !method.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()) {
        return Err(DidError::InvalidDid(format!("invalid method in {}", did)));
    }
    if id.is_empty() {
        return Err(DidError::InvalidDid(format!("{} has an empty method-specific id", did)));
    }
    Ok((method, id))
}

//! Nonce store
//!
//! Durable record of the latest challenge nonce per app-instance DID. The
//! challenge issuer writes it, the response validator reads it, and a
//! successful auth attaches an audit record of the issued access token.
//!
//! At most one record exists per app-instance DID; a newer sign-in replaces
//! the nonce of the previous one.

mod memory;
mod mongo;

pub use memory::MemoryNonceStore;
pub use mongo::MongoNonceStore;

use async_trait::async_trait;

use crate::types::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonceRecord {
    pub app_instance_did: String,
    pub nonce: String,
    /// Unix seconds
    pub expires_at: i64,
}

impl NonceRecord {
    /// A nonce is still usable at exactly `expires_at`
    pub fn is_expired_at(&self, now: i64) -> bool {
        now > self.expires_at
    }
}

/// Audit trail written after a successful auth
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessTokenRecord {
    pub app_instance_did: String,
    pub user_did: String,
    pub app_did: String,
    pub access_token: String,
    pub expires_at: i64,
}

#[async_trait]
pub trait NonceStore: Send + Sync {
    /// Create or replace the nonce for an app-instance DID, atomically
    async fn upsert(&self, app_instance_did: &str, nonce: &str, expires_at: i64) -> Result<()>;

    async fn get(&self, app_instance_did: &str) -> Result<Option<NonceRecord>>;

    async fn find_by_nonce(&self, nonce: &str) -> Result<Option<NonceRecord>>;

    /// Attach the issued access token to an existing record
    async fn record_access_token(&self, record: &AccessTokenRecord) -> Result<()>;

    async fn access_token(&self, app_instance_did: &str) -> Result<Option<AccessTokenRecord>>;
}

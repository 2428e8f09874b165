//! In-memory nonce store for dev mode and tests

use async_trait::async_trait;
use dashmap::DashMap;

use super::{AccessTokenRecord, NonceRecord, NonceStore};
use crate::types::{Result, VaultError};

#[derive(Debug, Clone)]
struct Entry {
    nonce: NonceRecord,
    access: Option<AccessTokenRecord>,
}

#[derive(Debug, Default)]
pub struct MemoryNonceStore {
    entries: DashMap<String, Entry>,
}

impl MemoryNonceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl NonceStore for MemoryNonceStore {
    async fn upsert(&self, app_instance_did: &str, nonce: &str, expires_at: i64) -> Result<()> {
        let record = NonceRecord {
            app_instance_did: app_instance_did.to_string(),
            nonce: nonce.to_string(),
            expires_at,
        };
        self.entries
            .entry(app_instance_did.to_string())
            .and_modify(|e| e.nonce = record.clone())
            .or_insert_with(|| Entry {
                nonce: record.clone(),
                access: None,
            });
        Ok(())
    }

    async fn get(&self, app_instance_did: &str) -> Result<Option<NonceRecord>> {
        Ok(self.entries.get(app_instance_did).map(|e| e.nonce.clone()))
    }

    async fn find_by_nonce(&self, nonce: &str) -> Result<Option<NonceRecord>> {
        Ok(self
            .entries
            .iter()
            .find(|e| e.nonce.nonce == nonce)
            .map(|e| e.nonce.clone()))
    }

    async fn record_access_token(&self, record: &AccessTokenRecord) -> Result<()> {
        let mut entry = self
            .entries
            .get_mut(&record.app_instance_did)
            .ok_or_else(|| {
                VaultError::NotFound(format!("no DID record for {}", record.app_instance_did))
            })?;
        entry.access = Some(record.clone());
        Ok(())
    }

    async fn access_token(&self, app_instance_did: &str) -> Result<Option<AccessTokenRecord>> {
        Ok(self
            .entries
            .get(app_instance_did)
            .and_then(|e| e.access.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_upsert_overwrites() {
        let store = MemoryNonceStore::new();
        store.upsert("did:example:app1", "n1", 100).await.unwrap();
        store.upsert("did:example:app1", "n2", 200).await.unwrap();

        assert_eq!(store.len(), 1);
        let record = store.get("did:example:app1").await.unwrap().unwrap();
        assert_eq!(record.nonce, "n2");
        assert_eq!(record.expires_at, 200);

        assert!(store.find_by_nonce("n1").await.unwrap().is_none());
        assert_eq!(
            store.find_by_nonce("n2").await.unwrap().unwrap().app_instance_did,
            "did:example:app1"
        );
    }

    #[tokio::test]
    async fn test_access_token_needs_record() {
        let store = MemoryNonceStore::new();
        let audit = AccessTokenRecord {
            app_instance_did: "did:example:app1".into(),
            user_did: "did:example:user1".into(),
            app_did: "did:example:appdid".into(),
            access_token: "t".into(),
            expires_at: 10,
        };

        assert!(matches!(
            store.record_access_token(&audit).await,
            Err(VaultError::NotFound(_))
        ));

        store.upsert("did:example:app1", "n1", 100).await.unwrap();
        store.record_access_token(&audit).await.unwrap();
        assert_eq!(store.access_token("did:example:app1").await.unwrap(), Some(audit.clone()));

        // A new sign-in keeps the audit trail
        store.upsert("did:example:app1", "n2", 200).await.unwrap();
        assert_eq!(store.access_token("did:example:app1").await.unwrap(), Some(audit));
    }

    #[tokio::test]
    async fn test_concurrent_upserts_leave_one_record() {
        let store = Arc::new(MemoryNonceStore::new());
        let mut handles = Vec::new();
        for i in 0..32 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .upsert("did:example:app1", &format!("n{}", i), 100 + i)
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(store.len(), 1);
        let record = store.get("did:example:app1").await.unwrap().unwrap();
        // Whichever write landed last, nonce and expiry belong together
        assert_eq!(record.nonce, format!("n{}", record.expires_at - 100));
    }
}

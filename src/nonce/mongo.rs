//! MongoDB-backed nonce store over the `did_info` collection

use async_trait::async_trait;
use bson::{doc, DateTime};
use tracing::debug;

use super::{AccessTokenRecord, NonceRecord, NonceStore};
use crate::db::schemas::{DidInfoDoc, DID_INFO_COLLECTION};
use crate::db::{MongoClient, MongoCollection};
use crate::types::{Result, VaultError};

pub struct MongoNonceStore {
    collection: MongoCollection<DidInfoDoc>,
}

impl MongoNonceStore {
    pub async fn new(mongo: &MongoClient) -> Result<Self> {
        let collection = mongo.collection::<DidInfoDoc>(DID_INFO_COLLECTION).await?;
        Ok(Self { collection })
    }
}

#[async_trait]
impl NonceStore for MongoNonceStore {
    async fn upsert(&self, app_instance_did: &str, nonce: &str, expires_at: i64) -> Result<()> {
        let now = DateTime::now();
        self.collection
            .upsert_one(
                doc! { "_id": app_instance_did },
                doc! {
                    "$set": {
                        "nonce": nonce,
                        "nonce_expires_at": expires_at,
                        "metadata.updated_at": now,
                    },
                    "$setOnInsert": { "metadata.created_at": now },
                },
            )
            .await?;
        debug!(app_instance_did = %app_instance_did, "Stored sign-in nonce");
        Ok(())
    }

    async fn get(&self, app_instance_did: &str) -> Result<Option<NonceRecord>> {
        let doc = self
            .collection
            .find_one(doc! { "_id": app_instance_did })
            .await?;
        Ok(doc.map(|d| d.nonce_record()))
    }

    async fn find_by_nonce(&self, nonce: &str) -> Result<Option<NonceRecord>> {
        let doc = self.collection.find_one(doc! { "nonce": nonce }).await?;
        Ok(doc.map(|d| d.nonce_record()))
    }

    async fn record_access_token(&self, record: &AccessTokenRecord) -> Result<()> {
        let result = self
            .collection
            .update_one(
                doc! { "_id": &record.app_instance_did },
                doc! {
                    "$set": {
                        "user_did": &record.user_did,
                        "app_did": &record.app_did,
                        "access_token": &record.access_token,
                        "access_token_expires_at": record.expires_at,
                        "metadata.updated_at": DateTime::now(),
                    }
                },
            )
            .await?;

        if result.matched_count == 0 {
            return Err(VaultError::NotFound(format!(
                "no DID record for {}",
                record.app_instance_did
            )));
        }
        Ok(())
    }

    async fn access_token(&self, app_instance_did: &str) -> Result<Option<AccessTokenRecord>> {
        let doc = self
            .collection
            .find_one(doc! { "_id": app_instance_did })
            .await?;
        Ok(doc.and_then(|d| d.access_token_record()))
    }
}

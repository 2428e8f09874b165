//! App-instance DID record
//!
//! One document per app-instance DID: the latest sign-in nonce and, after a
//! successful auth, an audit trail of the token that was issued.

use bson::{doc, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::IntoIndexes;
use crate::db::schemas::Metadata;
use crate::nonce::{AccessTokenRecord, NonceRecord};

/// Collection name for app-instance DID records
pub const DID_INFO_COLLECTION: &str = "did_info";

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct DidInfoDoc {
    /// App-instance DID
    #[serde(rename = "_id")]
    pub app_instance_did: String,

    #[serde(default)]
    pub metadata: Metadata,

    /// Latest issued challenge nonce
    pub nonce: String,

    /// Nonce expiry (Unix seconds)
    pub nonce_expires_at: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_did: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_did: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token_expires_at: Option<i64>,
}

impl DidInfoDoc {
    pub fn nonce_record(&self) -> NonceRecord {
        NonceRecord {
            app_instance_did: self.app_instance_did.clone(),
            nonce: self.nonce.clone(),
            expires_at: self.nonce_expires_at,
        }
    }

    /// Audit trail of the last issued access token, if any
    pub fn access_token_record(&self) -> Option<AccessTokenRecord> {
        match (
            &self.user_did,
            &self.app_did,
            &self.access_token,
            self.access_token_expires_at,
        ) {
            (Some(user_did), Some(app_did), Some(token), Some(expires_at)) => {
                Some(AccessTokenRecord {
                    app_instance_did: self.app_instance_did.clone(),
                    user_did: user_did.clone(),
                    app_did: app_did.clone(),
                    access_token: token.clone(),
                    expires_at,
                })
            }
            _ => None,
        }
    }
}

impl IntoIndexes for DidInfoDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // Responses are matched to records by nonce value
            (
                doc! { "nonce": 1 },
                Some(IndexOptions::builder().name("nonce_index".to_string()).build()),
            ),
            (
                doc! { "access_token": 1 },
                Some(
                    IndexOptions::builder()
                        .sparse(true)
                        .name("access_token_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc_with_nonce() -> DidInfoDoc {
        DidInfoDoc {
            app_instance_did: "did:example:app1".into(),
            metadata: Metadata::new(),
            nonce: "n-1".into(),
            nonce_expires_at: 1_700_000_180,
            ..Default::default()
        }
    }

    #[test]
    fn test_serializes_did_as_id() {
        let bson_doc = bson::to_document(&doc_with_nonce()).unwrap();
        assert_eq!(bson_doc.get_str("_id").unwrap(), "did:example:app1");
        assert_eq!(bson_doc.get_i64("nonce_expires_at").unwrap(), 1_700_000_180);
        assert!(!bson_doc.contains_key("access_token"));
    }

    #[test]
    fn test_nonce_record() {
        let record = doc_with_nonce().nonce_record();
        assert_eq!(record.app_instance_did, "did:example:app1");
        assert_eq!(record.nonce, "n-1");
        assert_eq!(record.expires_at, 1_700_000_180);
    }

    #[test]
    fn test_access_token_record_requires_all_fields() {
        let mut doc = doc_with_nonce();
        assert!(doc.access_token_record().is_none());

        doc.user_did = Some("did:example:user1".into());
        doc.app_did = Some("did:example:appdid".into());
        doc.access_token = Some("token".into());
        assert!(doc.access_token_record().is_none());

        doc.access_token_expires_at = Some(1_700_003_600);
        let record = doc.access_token_record().unwrap();
        assert_eq!(record.user_did, "did:example:user1");
        assert_eq!(record.expires_at, 1_700_003_600);
    }

    #[test]
    fn test_indices() {
        let indices = DidInfoDoc::into_indices();
        assert_eq!(indices.len(), 2);
        assert_eq!(indices[0].0, doc! { "nonce": 1 });
    }
}

//! Sign-in challenge issuance

use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use super::CHALLENGE_SUBJECT;
use crate::clock::Clock;
use crate::did::{DidToolkit, DocumentCache, TokenClaims};
use crate::identity::IdentityContext;
use crate::nonce::NonceStore;
use crate::types::{Result, VaultError};

pub struct ChallengeIssuer {
    identity: Arc<IdentityContext>,
    toolkit: Arc<dyn DidToolkit>,
    nonces: Arc<dyn NonceStore>,
    documents: Arc<dyn DocumentCache>,
    clock: Arc<dyn Clock>,
    challenge_ttl_secs: i64,
}

impl ChallengeIssuer {
    pub fn new(
        identity: Arc<IdentityContext>,
        toolkit: Arc<dyn DidToolkit>,
        nonces: Arc<dyn NonceStore>,
        documents: Arc<dyn DocumentCache>,
        clock: Arc<dyn Clock>,
        challenge_ttl_secs: i64,
    ) -> Self {
        Self {
            identity,
            toolkit,
            nonces,
            documents,
            clock,
            challenge_ttl_secs,
        }
    }

    /// Record a fresh nonce for the app instance described by `document`
    /// and return a signed challenge carrying it.
    ///
    /// The nonce is durable before the challenge is returned; a store failure
    /// fails the call.
    pub async fn sign_in(&self, document: &Value) -> Result<String> {
        let document = self
            .toolkit
            .parse_document(document)
            .map_err(|e| VaultError::BadRequest(format!("The DID document is invalid: {}", e)))?;
        let app_instance_did = document.id.clone();

        if let Err(e) = self.documents.store(&document).await {
            warn!(app_instance_did = %app_instance_did, error = %e, "Failed to cache DID document");
        }

        let nonce = Uuid::new_v4().to_string();
        let now = self.clock.now_secs();
        let expires_at = now + self.challenge_ttl_secs;

        self.nonces
            .upsert(&app_instance_did, &nonce, expires_at)
            .await
            .map_err(|e| VaultError::Internal(format!("Failed to store the sign-in nonce: {}", e)))?;

        let claims = TokenClaims {
            nonce: Some(nonce),
            ..TokenClaims::new(self.identity.did(), &app_instance_did, CHALLENGE_SUBJECT)
        }
        .issued_at(now)
        .expires_at(expires_at);

        let challenge = self.toolkit.sign_and_compact(&self.identity, &claims)?;

        info!(app_instance_did = %app_instance_did, expires_at, "Issued sign-in challenge");
        Ok(challenge)
    }
}

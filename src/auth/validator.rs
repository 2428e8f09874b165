//! Challenge response validation
//!
//! A response token is accepted only when all of these hold, checked in
//! order (the first failure is reported):
//!
//! 1. the token verifies against its issuer's key and has not expired
//! 2. it carries a presentation with at least one credential
//! 3. the presentation realm is this node's DID
//! 4. the presentation nonce matches a live sign-in record
//! 5. the first credential has a subject map and an issuer, and its proof
//!    verifies against the issuer's published key
//! 6. the credential subject (and the token issuer) is the app instance that
//!    signed in
//! 7. the credential subject carries every required prop, each a non-empty
//!    string
//! 8. the credential has an expiration date
//!
//! The claim set is built only after every check passed.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::debug;

use crate::clock::Clock;
use crate::did::DidToolkit;
use crate::identity::IdentityContext;
use crate::nonce::NonceStore;
use crate::types::{Result, VaultError};

/// Credential subject props an access token is scoped by
pub const AUTH_REQUIRED_PROPS: &[&str] = &["appDid"];

/// Credential subject props a backup token is scoped by
pub const BACKUP_REQUIRED_PROPS: &[&str] = &["sourceDID", "targetHost", "targetDID"];

/// Outcome of a successful validation
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedClaimSet {
    /// App-instance DID (audience of the token to mint)
    pub id: String,
    /// Credential issuer, proven by the credential proof
    pub user_did: String,
    pub nonce: String,
    /// min(now + access token TTL, credential expiration)
    pub exp_time: i64,
    /// Required props copied from the credential subject
    pub props: Map<String, Value>,
}

impl ValidatedClaimSet {
    pub fn prop(&self, name: &str) -> Option<&str> {
        self.props.get(name).and_then(Value::as_str)
    }

    /// Seconds the minted token would stay valid
    pub fn remaining_lifetime(&self, now: i64) -> i64 {
        self.exp_time - now
    }
}

pub struct ResponseValidator {
    identity: Arc<IdentityContext>,
    toolkit: Arc<dyn DidToolkit>,
    nonces: Arc<dyn NonceStore>,
    clock: Arc<dyn Clock>,
    access_token_ttl_secs: i64,
}

fn bad_request(message: impl Into<String>) -> VaultError {
    VaultError::BadRequest(message.into())
}

impl ResponseValidator {
    pub fn new(
        identity: Arc<IdentityContext>,
        toolkit: Arc<dyn DidToolkit>,
        nonces: Arc<dyn NonceStore>,
        clock: Arc<dyn Clock>,
        access_token_ttl_secs: i64,
    ) -> Self {
        Self {
            identity,
            toolkit,
            nonces,
            clock,
            access_token_ttl_secs,
        }
    }

    pub async fn validate_auth(&self, response: &str) -> Result<ValidatedClaimSet> {
        self.validate(response, AUTH_REQUIRED_PROPS).await
    }

    pub async fn validate_backup(&self, response: &str) -> Result<ValidatedClaimSet> {
        self.validate(response, BACKUP_REQUIRED_PROPS).await
    }

    pub async fn validate(&self, response: &str, required: &[&str]) -> Result<ValidatedClaimSet> {
        if response.trim().is_empty() {
            return Err(bad_request("Invalid parameter: empty challenge response"));
        }

        let token = self
            .toolkit
            .parse_token(response)
            .await
            .map_err(|e| bad_request(format!("Invalid challenge response: {}", e)))?;

        let presentation_value = token
            .claims
            .presentation
            .as_ref()
            .ok_or_else(|| bad_request("Can not get the presentation"))?;
        let presentation = self
            .toolkit
            .parse_presentation(presentation_value)
            .map_err(|e| bad_request(format!("The presentation is invalid: {}", e)))?;

        if presentation.realm.is_empty() {
            return Err(bad_request("Can not get the presentation realm"));
        }
        if presentation.realm != self.identity.did() {
            return Err(bad_request("The realm is incorrect"));
        }

        if presentation.nonce.is_empty() {
            return Err(bad_request("Can not get the presentation nonce"));
        }
        let record = self
            .nonces
            .find_by_nonce(&presentation.nonce)
            .await?
            .ok_or_else(|| bad_request("The nonce is not found"))?;

        let now = self.clock.now_secs();
        if record.is_expired_at(now) {
            return Err(bad_request("The nonce is expired"));
        }

        let first = presentation
            .verifiable_credential
            .first()
            .ok_or_else(|| bad_request("No presentation credential exists"))?;
        let credential = self
            .toolkit
            .parse_credential(first)
            .map_err(|e| bad_request(format!("The credential is invalid: {}", e)))?;
        self.toolkit
            .verify_credential(&credential)
            .await
            .map_err(|e| bad_request(format!("The credential proof is invalid: {}", e)))?;

        if credential.subject_id() != Some(record.app_instance_did.as_str()) {
            return Err(bad_request("The app instance DID of the credential does not match"));
        }
        if token.issuer() != record.app_instance_did {
            return Err(bad_request("The challenge response was not signed by the app instance"));
        }

        let missing: Vec<&str> = required
            .iter()
            .copied()
            .filter(|name| credential.subject_prop(name).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(bad_request(format!(
                "The credential does not contain the required props: {}",
                missing.join(", ")
            )));
        }

        let mut props = Map::new();
        for name in required {
            match credential.subject_prop(name) {
                Some(Value::String(value)) if !value.is_empty() => {
                    props.insert((*name).to_string(), Value::String(value.clone()));
                }
                _ => {
                    return Err(bad_request(format!(
                        "The credential prop {} must be a non-empty string",
                        name
                    )))
                }
            }
        }

        let expiration = credential
            .expiration_timestamp()
            .ok_or_else(|| bad_request("The credential has no expiration date"))?;
        let exp_time = (now + self.access_token_ttl_secs).min(expiration);

        debug!(
            app_instance_did = %record.app_instance_did,
            user_did = %credential.issuer,
            exp_time,
            "Validated challenge response"
        );

        Ok(ValidatedClaimSet {
            id: record.app_instance_did,
            user_did: credential.issuer,
            nonce: record.nonce,
            exp_time,
            props,
        })
    }
}

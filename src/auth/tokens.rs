//! Scoped token issuance
//!
//! Every token is signed by the node identity with `aud` set to the party it
//! was minted for. Issuance writes no state.
//!
//! | Subject        | Audience          | Payload claim | Expires            |
//! |----------------|-------------------|---------------|--------------------|
//! | `AccessToken`  | app-instance DID  | `props`       | claim set expTime  |
//! | `BackupToken`  | app-instance DID  | `props`       | claim set expTime  |
//! | `Hive Payment` | user DID          | `order`       | caller supplied    |
//! | `Hive Receipt` | user DID          | `receipt`     | never              |

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::validator::ValidatedClaimSet;
use super::{ACCESS_TOKEN_SUBJECT, BACKUP_TOKEN_SUBJECT, PAYMENT_PROOF_SUBJECT, RECEIPT_SUBJECT};
use crate::did::{DidToolkit, TokenClaims};
use crate::identity::IdentityContext;
use crate::types::{Result, VaultError};

// =============================================================================
// Token props
// =============================================================================

/// `props` claim of an access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessProps {
    #[serde(rename = "userDid")]
    pub user_did: String,
    #[serde(rename = "appDid")]
    pub app_did: String,
    pub nonce: String,
}

/// `props` claim of a backup token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupProps {
    #[serde(rename = "sourceDID")]
    pub source_did: String,
    #[serde(rename = "targetHost")]
    pub target_host: String,
    #[serde(rename = "targetDID")]
    pub target_did: String,
    #[serde(rename = "userDid")]
    pub user_did: String,
    pub nonce: String,
}

fn required_prop(claims: &ValidatedClaimSet, name: &str) -> Result<String> {
    claims
        .prop(name)
        .map(str::to_string)
        .ok_or_else(|| VaultError::BadRequest(format!("The claim set is missing {}", name)))
}

impl TryFrom<&ValidatedClaimSet> for AccessProps {
    type Error = VaultError;

    fn try_from(claims: &ValidatedClaimSet) -> Result<Self> {
        Ok(Self {
            user_did: claims.user_did.clone(),
            app_did: required_prop(claims, "appDid")?,
            nonce: claims.nonce.clone(),
        })
    }
}

impl TryFrom<&ValidatedClaimSet> for BackupProps {
    type Error = VaultError;

    fn try_from(claims: &ValidatedClaimSet) -> Result<Self> {
        Ok(Self {
            source_did: required_prop(claims, "sourceDID")?,
            target_host: required_prop(claims, "targetHost")?,
            target_did: required_prop(claims, "targetDID")?,
            user_did: claims.user_did.clone(),
            nonce: claims.nonce.clone(),
        })
    }
}

/// A verified access token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessGrant {
    pub app_instance_did: String,
    pub props: AccessProps,
    pub expires_at: Option<i64>,
}

// =============================================================================
// Issuer
// =============================================================================

pub struct TokenIssuer {
    identity: Arc<IdentityContext>,
    toolkit: Arc<dyn DidToolkit>,
}

impl TokenIssuer {
    pub fn new(identity: Arc<IdentityContext>, toolkit: Arc<dyn DidToolkit>) -> Self {
        Self { identity, toolkit }
    }

    fn sign(&self, claims: &TokenClaims) -> Result<String> {
        Ok(self.toolkit.sign_and_compact(&self.identity, claims)?)
    }

    pub fn create_access_token(&self, claims: &ValidatedClaimSet) -> Result<String> {
        let props = AccessProps::try_from(claims)?;
        let token = TokenClaims {
            props: Some(serde_json::to_string(&props)?),
            ..TokenClaims::new(self.identity.did(), &claims.id, ACCESS_TOKEN_SUBJECT)
        }
        .expires_at(claims.exp_time);
        self.sign(&token)
    }

    pub fn create_backup_token(&self, claims: &ValidatedClaimSet) -> Result<String> {
        let props = BackupProps::try_from(claims)?;
        let token = TokenClaims {
            props: Some(serde_json::to_string(&props)?),
            ..TokenClaims::new(self.identity.did(), &claims.id, BACKUP_TOKEN_SUBJECT)
        }
        .expires_at(claims.exp_time);
        self.sign(&token)
    }

    /// Sign a payment order for `user_did`, valid until `exp`
    pub fn create_payment_proof(&self, user_did: &str, order: &Value, exp: i64) -> Result<String> {
        let token = TokenClaims {
            order: Some(order.to_string()),
            ..TokenClaims::new(self.identity.did(), user_did, PAYMENT_PROOF_SUBJECT)
        }
        .expires_at(exp);
        self.sign(&token)
    }

    /// Verify a payment proof this node issued to `user_did` and return
    /// its order
    pub async fn get_proof_info(&self, proof: &str, user_did: &str) -> Result<Value> {
        let token = self
            .toolkit
            .parse_token(proof)
            .await
            .map_err(|e| VaultError::BadRequest(format!("Invalid payment proof: {}", e)))?;

        if token.issuer() != self.identity.did()
            || token.audience() != user_did
            || token.subject() != PAYMENT_PROOF_SUBJECT
        {
            return Err(VaultError::BadRequest(
                "The payment proof was not issued to this user".into(),
            ));
        }

        let order = token
            .claims
            .order
            .as_deref()
            .ok_or_else(|| VaultError::BadRequest("The payment proof carries no order".into()))?;
        serde_json::from_str(order)
            .map_err(|e| VaultError::BadRequest(format!("The payment order is invalid: {}", e)))
    }

    /// Sign a receipt for `user_did`; receipts never expire
    pub fn create_receipt_proof(&self, user_did: &str, receipt: &Value) -> Result<String> {
        let token = TokenClaims {
            receipt: Some(receipt.to_string()),
            ..TokenClaims::new(self.identity.did(), user_did, RECEIPT_SUBJECT)
        };
        self.sign(&token)
    }

    /// Verify a bearer access token issued by this node
    pub async fn verify_access_token(&self, token: &str) -> Result<AccessGrant> {
        let parsed = self
            .toolkit
            .parse_token(token)
            .await
            .map_err(|e| VaultError::Unauthorized(e.to_string()))?;

        if parsed.issuer() != self.identity.did() {
            return Err(VaultError::Unauthorized("token was not issued by this node".into()));
        }
        if parsed.subject() != ACCESS_TOKEN_SUBJECT {
            return Err(VaultError::Unauthorized("not an access token".into()));
        }

        let props: AccessProps = parsed
            .claims
            .props
            .as_deref()
            .ok_or_else(|| VaultError::Unauthorized("access token carries no props".into()))
            .and_then(|p| {
                serde_json::from_str(p)
                    .map_err(|e| VaultError::Unauthorized(format!("invalid token props: {}", e)))
            })?;

        Ok(AccessGrant {
            app_instance_did: parsed.claims.aud,
            props,
            expires_at: parsed.claims.exp,
        })
    }
}

/// Extract the token from an Authorization header value.
///
/// Accepts `token <t>`, `Bearer <t>` and a bare token.
pub fn extract_token_from_header(auth_header: Option<&str>) -> Option<&str> {
    let header = auth_header?.trim_start();

    for prefix in ["token ", "Bearer "] {
        if let Some(token) = header.strip_prefix(prefix) {
            let token = token.trim();
            return if token.is_empty() { None } else { Some(token) };
        }
    }

    let bare = header.trim();
    if !bare.is_empty() && !bare.contains(' ') {
        return Some(bare);
    }

    None
}

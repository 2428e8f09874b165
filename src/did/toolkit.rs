//! DID toolkit capability set
//!
//! The auth engine never touches JWS or key encodings directly; it parses
//! documents, tokens, credentials and presentations, signs tokens and
//! verifies credential proofs through [`DidToolkit`].

use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde_json::{json, Value};
use tracing::debug;

use super::credential::{PROOF_JWS_TYPE, PROOF_TYPE};
use super::{
    Credential, DidDocument, DidError, DidResolver, ParsedToken, Presentation, TokenClaims,
};
use crate::clock::Clock;
use crate::identity::IdentityContext;

#[async_trait]
pub trait DidToolkit: Send + Sync {
    /// Parse and validate a DID document
    fn parse_document(&self, value: &Value) -> Result<DidDocument, DidError>;

    /// Verify a compact token's signature against its issuer's key and
    /// check its expiration
    async fn parse_token(&self, token: &str) -> Result<ParsedToken, DidError>;

    /// Sign claims as `identity`
    fn sign_and_compact(
        &self,
        identity: &IdentityContext,
        claims: &TokenClaims,
    ) -> Result<String, DidError>;

    fn parse_credential(&self, value: &Value) -> Result<Credential, DidError>;

    /// Attach a proof signed by `issuer`, who must be the credential issuer
    fn sign_credential(
        &self,
        issuer: &IdentityContext,
        credential: Credential,
    ) -> Result<Credential, DidError>;

    /// Check the proof against the issuer's published key
    async fn verify_credential(&self, credential: &Credential) -> Result<(), DidError>;

    fn parse_presentation(&self, value: &Value) -> Result<Presentation, DidError>;
}

/// EdDSA compact JWS over Ed25519 DID keys
pub struct JwsToolkit {
    resolver: Arc<DidResolver>,
    clock: Arc<dyn Clock>,
}

impl JwsToolkit {
    pub fn new(resolver: Arc<DidResolver>, clock: Arc<dyn Clock>) -> Self {
        Self { resolver, clock }
    }
}

/// Read claims without verifying anything; only used to find the issuer
/// whose key will verify the token.
fn peek_claims(token: &str) -> Result<TokenClaims, DidError> {
    let mut parts = token.split('.');
    let payload = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(_), Some(payload), Some(_), None) => payload,
        _ => return Err(DidError::InvalidToken("not a compact JWS".into())),
    };
    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|e| DidError::InvalidToken(format!("payload encoding: {}", e)))?;
    serde_json::from_slice(&bytes).map_err(|e| DidError::InvalidToken(format!("payload: {}", e)))
}

fn ed25519_decoding_key(key: &ed25519_dalek::VerifyingKey) -> Result<DecodingKey, DidError> {
    DecodingKey::from_ed_components(&URL_SAFE_NO_PAD.encode(key.as_bytes()))
        .map_err(|e| DidError::InvalidToken(e.to_string()))
}

/// Signature check only; claim checks are the caller's
fn signature_validation() -> Validation {
    let mut validation = Validation::new(Algorithm::EdDSA);
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();
    validation
}

#[async_trait]
impl DidToolkit for JwsToolkit {
    fn parse_document(&self, value: &Value) -> Result<DidDocument, DidError> {
        DidDocument::from_value(value)
    }

    async fn parse_token(&self, token: &str) -> Result<ParsedToken, DidError> {
        let header = decode_header(token).map_err(|e| DidError::InvalidToken(e.to_string()))?;
        if header.alg != Algorithm::EdDSA {
            return Err(DidError::InvalidToken(format!(
                "unsupported algorithm {:?}",
                header.alg
            )));
        }

        let issuer = peek_claims(token)?.iss;
        if issuer.is_empty() {
            return Err(DidError::InvalidToken("token has no issuer".into()));
        }

        let document = self.resolver.resolve(&issuer).await?;
        let key = document.verification_key(header.kid.as_deref())?;
        let decoding_key = ed25519_decoding_key(&key)?;

        // Expiry is checked against the injected clock below
        let data = decode::<TokenClaims>(token, &decoding_key, &signature_validation())
            .map_err(|e| DidError::InvalidToken(e.to_string()))?;

        if let Some(exp) = data.claims.exp {
            if self.clock.now_secs() > exp {
                return Err(DidError::TokenExpired);
            }
        }

        debug!(iss = %data.claims.iss, sub = %data.claims.sub, "Verified token");
        Ok(ParsedToken {
            kid: header.kid,
            claims: data.claims,
        })
    }

    fn sign_and_compact(
        &self,
        identity: &IdentityContext,
        claims: &TokenClaims,
    ) -> Result<String, DidError> {
        identity.sign_token(claims)
    }

    fn parse_credential(&self, value: &Value) -> Result<Credential, DidError> {
        Credential::from_value(value)
    }

    fn sign_credential(
        &self,
        issuer: &IdentityContext,
        credential: Credential,
    ) -> Result<Credential, DidError> {
        if credential.issuer != issuer.did() {
            return Err(DidError::Signing(format!(
                "{} cannot sign a credential issued by {}",
                issuer.did(),
                credential.issuer
            )));
        }
        let jws = issuer.sign_jws(PROOF_JWS_TYPE, &credential.signing_payload())?;
        Ok(Credential {
            proof: Some(json!({
                "type": PROOF_TYPE,
                "verificationMethod": issuer.key_id(),
                "jws": jws,
            })),
            ..credential
        })
    }

    async fn verify_credential(&self, credential: &Credential) -> Result<(), DidError> {
        let jws = credential
            .proof_jws()
            .ok_or_else(|| DidError::InvalidCredential("the credential has no proof".into()))?;
        let header = decode_header(jws)
            .map_err(|e| DidError::InvalidCredential(format!("proof: {}", e)))?;
        if header.alg != Algorithm::EdDSA {
            return Err(DidError::InvalidCredential(format!(
                "unsupported proof algorithm {:?}",
                header.alg
            )));
        }

        // Users are identified by published documents only
        let document = self.resolver.resolve_published(&credential.issuer).await?;
        let key = document.verification_key(header.kid.as_deref())?;

        let signed = decode::<Value>(jws, &ed25519_decoding_key(&key)?, &signature_validation())
            .map_err(|e| DidError::InvalidCredential(format!("proof: {}", e)))?
            .claims;
        if signed != credential.signing_payload() {
            return Err(DidError::InvalidCredential(
                "the proof does not cover this credential".into(),
            ));
        }

        debug!(issuer = %credential.issuer, "Verified credential proof");
        Ok(())
    }

    fn parse_presentation(&self, value: &Value) -> Result<Presentation, DidError> {
        Presentation::from_value(value)
    }
}

//! Node identity
//!
//! The node's DID, its public DID document and its signing key. Built once
//! at startup and shared read-only; every token the node issues is signed
//! here.

pub mod crypto;

use ed25519_dalek::pkcs8::EncodePrivateKey;
use ed25519_dalek::{Signature, SigningKey, VerifyingKey};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::Serialize;

use crate::did::key::did_key_from_verifying_key;
use crate::did::{parse_did, DidDocument, DidError, Service, TokenClaims};
use crate::types::Result;

pub struct IdentityContext {
    did: String,
    document: DidDocument,
    signing_key: SigningKey,
    key_id: String,
}

impl std::fmt::Debug for IdentityContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityContext")
            .field("did", &self.did)
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

impl IdentityContext {
    /// Identity under an explicit DID, documented with a single Ed25519 key
    pub fn new(did: impl Into<String>, signing_key: SigningKey) -> std::result::Result<Self, DidError> {
        let did = did.into();
        parse_did(&did)?;

        let document = DidDocument::for_key(&did, &signing_key.verifying_key());
        let key_id = document
            .verification_method
            .first()
            .map(|vm| vm.id.clone())
            .ok_or_else(|| DidError::InvalidDocument("identity document has no key".into()))?;

        Ok(Self {
            did,
            document,
            signing_key,
            key_id,
        })
    }

    /// Self-describing `did:key` identity for a signing key
    pub fn from_signing_key(signing_key: SigningKey) -> Self {
        let did = did_key_from_verifying_key(&signing_key.verifying_key());
        let document = DidDocument::for_key(&did, &signing_key.verifying_key());
        let key_id = document
            .verification_method
            .first()
            .map(|vm| vm.id.clone())
            .unwrap_or_default();
        Self {
            did,
            document,
            signing_key,
            key_id,
        }
    }

    /// Identity derived from the configured secret and passphrase
    pub fn from_secret(secret: &str, passphrase: &str) -> Result<Self> {
        let signing_key = crypto::derive_signing_key(secret, passphrase)?;
        Ok(Self::from_signing_key(signing_key))
    }

    /// Ephemeral identity (dev mode without a configured secret)
    pub fn generate() -> Self {
        Self::from_signing_key(crypto::generate_signing_key())
    }

    /// Advertise a service endpoint in the public document
    pub fn with_service(mut self, service_type: &str, endpoint: &str) -> Self {
        let id = format!("{}#{}", self.did, service_type.to_ascii_lowercase());
        self.document.service.retain(|s| s.id != id);
        self.document.service.push(Service {
            id,
            service_type: service_type.to_string(),
            service_endpoint: endpoint.to_string(),
        });
        self
    }

    pub fn did(&self) -> &str {
        &self.did
    }

    pub fn document(&self) -> &DidDocument {
        &self.document
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Verification method id placed in the `kid` header of issued tokens
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    pub fn sign(&self, payload: &[u8]) -> Signature {
        crypto::sign_payload(&self.signing_key, payload)
    }

    /// Sign claims as a compact EdDSA JWS
    pub fn sign_token(&self, claims: &TokenClaims) -> std::result::Result<String, DidError> {
        self.sign_jws("JWT", claims)
    }

    /// Sign any JSON payload as a compact EdDSA JWS with this identity's `kid`
    pub fn sign_jws<T: Serialize>(&self, typ: &str, payload: &T) -> std::result::Result<String, DidError> {
        let mut header = Header::new(Algorithm::EdDSA);
        header.typ = Some(typ.to_string());
        header.kid = Some(self.key_id.clone());

        let der = self
            .signing_key
            .to_pkcs8_der()
            .map_err(|e| DidError::Signing(e.to_string()))?;
        let key = EncodingKey::from_ed_der(der.as_bytes());

        jsonwebtoken::encode(&header, payload, &key).map_err(|e| DidError::Signing(e.to_string()))
    }
}

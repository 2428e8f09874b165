//! DID document structure

use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::key::{
    decode_base58_ed25519, decode_multibase_ed25519, did_key_from_verifying_key,
    encode_multibase_ed25519, verifying_key_from_did_key,
};
use super::{parse_did, DidError};

pub const DID_CONTEXT: &str = "https://www.w3.org/ns/did/v1";
pub const ED25519_2020_CONTEXT: &str = "https://w3id.org/security/suites/ed25519-2020/v1";
pub const ED25519_KEY_TYPE: &str = "Ed25519VerificationKey2020";

/// Service type advertised by vault nodes in their documents
pub const VAULT_SERVICE_TYPE: &str = "VaultNode";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DidDocument {
    #[serde(rename = "@context", default)]
    pub context: Vec<String>,

    /// The DID this document describes
    pub id: String,

    #[serde(rename = "verificationMethod", default)]
    pub verification_method: Vec<VerificationMethod>,

    /// Authentication verification method references
    #[serde(default)]
    pub authentication: Vec<String>,

    #[serde(rename = "assertionMethod", default)]
    pub assertion_method: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub service: Vec<Service>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationMethod {
    pub id: String,
    #[serde(rename = "type")]
    pub method_type: String,
    pub controller: String,
    #[serde(rename = "publicKeyMultibase", skip_serializing_if = "Option::is_none")]
    pub public_key_multibase: Option<String>,
    #[serde(rename = "publicKeyBase58", skip_serializing_if = "Option::is_none")]
    pub public_key_base58: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub id: String,
    #[serde(rename = "type")]
    pub service_type: String,
    #[serde(rename = "serviceEndpoint")]
    pub service_endpoint: String,
}

impl VerificationMethod {
    /// Decode the Ed25519 key carried by this method
    pub fn ed25519_key(&self) -> Result<VerifyingKey, DidError> {
        if let Some(multibase) = &self.public_key_multibase {
            decode_multibase_ed25519(multibase)
        } else if let Some(base58) = &self.public_key_base58 {
            decode_base58_ed25519(base58)
        } else {
            Err(DidError::InvalidDocument(format!(
                "verification method {} carries no public key",
                self.id
            )))
        }
    }

    /// Whether this method is the one named by a token `kid`.
    ///
    /// Relative ids (`#primary`) match any absolute reference ending in them.
    fn matches(&self, kid: &str) -> bool {
        self.id == kid || (self.id.starts_with('#') && kid.ends_with(&self.id))
    }
}

impl DidDocument {
    /// Build a single-key document for `did`
    pub fn for_key(did: &str, key: &VerifyingKey) -> Self {
        let multibase = encode_multibase_ed25519(key);
        let key_id = format!("{}#{}", did, multibase);
        Self {
            context: vec![DID_CONTEXT.to_string(), ED25519_2020_CONTEXT.to_string()],
            id: did.to_string(),
            verification_method: vec![VerificationMethod {
                id: key_id.clone(),
                method_type: ED25519_KEY_TYPE.to_string(),
                controller: did.to_string(),
                public_key_multibase: Some(multibase),
                public_key_base58: None,
            }],
            authentication: vec![key_id.clone()],
            assertion_method: vec![key_id],
            service: vec![],
        }
    }

    /// Build the self-describing document of a `did:key` identifier
    pub fn from_did_key(did: &str) -> Result<Self, DidError> {
        let key = verifying_key_from_did_key(did)?;
        if did_key_from_verifying_key(&key) != did {
            return Err(DidError::InvalidDid(format!("{} is not a canonical did:key", did)));
        }
        Ok(Self::for_key(did, &key))
    }

    /// Parse and structurally validate a document from JSON
    pub fn from_value(value: &Value) -> Result<Self, DidError> {
        if !value.is_object() {
            return Err(DidError::InvalidDocument("document must be a JSON object".into()));
        }
        let document: DidDocument = serde_json::from_value(value.clone())
            .map_err(|e| DidError::InvalidDocument(e.to_string()))?;
        document.validate()?;
        Ok(document)
    }

    /// Check the subject DID and every key the document carries.
    ///
    /// A `did:key` document must carry exactly the key its DID encodes.
    pub fn validate(&self) -> Result<(), DidError> {
        let (method, _) = parse_did(&self.id)?;

        if self.verification_method.is_empty() {
            return Err(DidError::InvalidDocument(format!(
                "{} has no verification methods",
                self.id
            )));
        }

        let mut keys = Vec::with_capacity(self.verification_method.len());
        for vm in &self.verification_method {
            keys.push(vm.ed25519_key()?);
        }

        if method == "key" {
            let embedded = verifying_key_from_did_key(&self.id)?;
            if !keys.contains(&embedded) {
                return Err(DidError::InvalidDocument(format!(
                    "{} does not carry the key its DID encodes",
                    self.id
                )));
            }
        }
        Ok(())
    }

    pub fn method(&self) -> Option<&str> {
        parse_did(&self.id).ok().map(|(method, _)| method)
    }

    pub fn method_specific_id(&self) -> Option<&str> {
        parse_did(&self.id).ok().map(|(_, id)| id)
    }

    /// Select the key a token was signed with.
    ///
    /// With a `kid` the referenced method must exist; without one the
    /// document's first method is used.
    pub fn verification_key(&self, kid: Option<&str>) -> Result<VerifyingKey, DidError> {
        let method = match kid {
            Some(kid) => self
                .verification_method
                .iter()
                .find(|vm| vm.matches(kid))
                .ok_or_else(|| {
                    DidError::InvalidToken(format!("key {} not found in document of {}", kid, self.id))
                })?,
            None => self.verification_method.first().ok_or_else(|| {
                DidError::InvalidDocument(format!("{} has no verification methods", self.id))
            })?,
        };
        method.ed25519_key()
    }

    /// Extract a specific service endpoint
    pub fn service_endpoint(&self, service_type: &str) -> Option<&str> {
        self.service
            .iter()
            .find(|s| s.service_type == service_type)
            .map(|s| s.service_endpoint.as_str())
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

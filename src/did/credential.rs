//! Verifiable credentials and presentations
//!
//! A credential is an issuer plus a subject map with an optional expiration,
//! signed by the issuer: its `proof.jws` is a compact EdDSA JWS whose payload
//! is the credential without its proof. A presentation wraps one or more
//! credentials for a specific verifier (`realm`) and challenge (`nonce`).

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::DidError;

pub const CREDENTIAL_TYPE: &str = "VerifiableCredential";
pub const PRESENTATION_TYPE: &str = "VerifiablePresentation";

/// `proof.type` of credentials signed by this crate
pub const PROOF_TYPE: &str = "JsonWebSignature2020";

/// `typ` header of a credential proof JWS
pub const PROOF_JWS_TYPE: &str = "vc+jws";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(rename = "type", default)]
    pub types: Vec<String>,

    /// DID of the credential issuer (the user)
    pub issuer: String,

    #[serde(rename = "issuanceDate", skip_serializing_if = "Option::is_none")]
    pub issuance_date: Option<DateTime<Utc>>,

    #[serde(rename = "expirationDate", skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<DateTime<Utc>>,

    #[serde(rename = "credentialSubject")]
    pub credential_subject: Map<String, Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub proof: Option<Value>,
}

impl Credential {
    /// Start a credential issued by `issuer` about `subject_id`
    pub fn new(issuer: impl Into<String>, subject_id: impl Into<String>) -> Self {
        let mut subject = Map::new();
        subject.insert("id".to_string(), Value::String(subject_id.into()));
        Self {
            id: None,
            types: vec![CREDENTIAL_TYPE.to_string()],
            issuer: issuer.into(),
            issuance_date: None,
            expiration_date: None,
            credential_subject: subject,
            proof: None,
        }
    }

    pub fn with_claim(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.credential_subject.insert(name.into(), value.into());
        self
    }

    pub fn with_expiration(mut self, ts: i64) -> Self {
        self.expiration_date = Utc.timestamp_opt(ts, 0).single();
        self
    }

    /// Parse a credential, requiring a subject map and an issuer
    pub fn from_value(value: &Value) -> Result<Self, DidError> {
        let subject_ok = value
            .get("credentialSubject")
            .map(Value::is_object)
            .unwrap_or(false);
        let issuer_ok = value
            .get("issuer")
            .and_then(Value::as_str)
            .map(|s| !s.is_empty())
            .unwrap_or(false);
        if !subject_ok || !issuer_ok {
            return Err(DidError::InvalidCredential(
                "the credential subject is invalid or the issuer does not exist".into(),
            ));
        }
        serde_json::from_value(value.clone()).map_err(|e| DidError::InvalidCredential(e.to_string()))
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// `credentialSubject.id`
    pub fn subject_id(&self) -> Option<&str> {
        self.credential_subject.get("id").and_then(Value::as_str)
    }

    pub fn subject_prop(&self, name: &str) -> Option<&Value> {
        self.credential_subject.get(name)
    }

    pub fn expiration_timestamp(&self) -> Option<i64> {
        self.expiration_date.map(|d| d.timestamp())
    }

    /// What the issuer signs: the credential minus its proof
    pub fn signing_payload(&self) -> Value {
        let mut value = self.to_value();
        if let Value::Object(map) = &mut value {
            map.remove("proof");
        }
        value
    }

    /// `proof.jws`, if the credential carries one
    pub fn proof_jws(&self) -> Option<&str> {
        self.proof.as_ref()?.get("jws")?.as_str()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Presentation {
    #[serde(rename = "type", default)]
    pub types: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub holder: Option<String>,

    /// DID of the verifier this presentation was built for
    #[serde(default)]
    pub realm: String,

    /// Challenge nonce issued by the verifier
    #[serde(default)]
    pub nonce: String,

    #[serde(rename = "verifiableCredential", default)]
    pub verifiable_credential: Vec<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub proof: Option<Value>,
}

impl Presentation {
    pub fn new(
        holder: impl Into<String>,
        realm: impl Into<String>,
        nonce: impl Into<String>,
        credentials: &[Credential],
    ) -> Self {
        Self {
            types: vec![PRESENTATION_TYPE.to_string()],
            holder: Some(holder.into()),
            realm: realm.into(),
            nonce: nonce.into(),
            verifiable_credential: credentials.iter().map(Credential::to_value).collect(),
            proof: None,
        }
    }

    /// Parse a presentation; it must carry at least one credential
    pub fn from_value(value: &Value) -> Result<Self, DidError> {
        if !value.is_object() {
            return Err(DidError::InvalidPresentation(
                "presentation must be a JSON object".into(),
            ));
        }
        let presentation: Presentation = serde_json::from_value(value.clone())
            .map_err(|e| DidError::InvalidPresentation(e.to_string()))?;
        if presentation.verifiable_credential.is_empty() {
            return Err(DidError::InvalidPresentation(
                "no presentation credential exists".into(),
            ));
        }
        Ok(presentation)
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

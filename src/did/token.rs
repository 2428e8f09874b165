//! JWT claims shared by challenge, response and issued tokens

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Claims carried by every token the node signs or verifies.
///
/// Which optional claims are present depends on the subject: challenges
/// carry `nonce`, responses carry `presentation`, access and backup tokens
/// carry `props`, payment proofs carry `order`, receipts carry `receipt`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Issuer DID
    #[serde(default)]
    pub iss: String,

    /// Audience DID
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub aud: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sub: String,

    /// Expiration (Unix seconds)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,

    /// Issued at (Unix seconds)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub presentation: Option<Value>,

    /// JSON-encoded scoped properties
    #[serde(skip_serializing_if = "Option::is_none")]
    pub props: Option<String>,

    /// JSON-encoded payment order
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<String>,

    /// JSON-encoded payment receipt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt: Option<String>,
}

impl TokenClaims {
    pub fn new(iss: impl Into<String>, aud: impl Into<String>, sub: impl Into<String>) -> Self {
        Self {
            iss: iss.into(),
            aud: aud.into(),
            sub: sub.into(),
            ..Default::default()
        }
    }

    pub fn expires_at(mut self, exp: i64) -> Self {
        self.exp = Some(exp);
        self
    }

    pub fn issued_at(mut self, iat: i64) -> Self {
        self.iat = Some(iat);
        self
    }
}

/// A verified token: signature checked, not expired
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedToken {
    /// Key id from the JWS header
    pub kid: Option<String>,
    pub claims: TokenClaims,
}

impl ParsedToken {
    pub fn issuer(&self) -> &str {
        &self.claims.iss
    }

    pub fn audience(&self) -> &str {
        &self.claims.aud
    }

    pub fn subject(&self) -> &str {
        &self.claims.sub
    }

    pub fn nonce(&self) -> Option<&str> {
        self.claims.nonce.as_deref()
    }
}

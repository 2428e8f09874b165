//! DID challenge-response authentication (server role)
//!
//! ## Flow
//!
//! 1. **sign-in**: the app instance posts its DID document; the node stores a
//!    fresh nonce for that DID and returns a signed challenge.
//! 2. **auth / backup-auth**: the app instance answers with a signed
//!    response token wrapping a presentation (realm = this node, nonce from
//!    the challenge) of a credential issued by the user; the node validates
//!    it and mints a scoped token.
//!
//! Payment proofs and receipts are minted by [`TokenIssuer`] for the billing
//! collaborator and are not exposed over HTTP.

pub mod challenge;
pub mod service;
pub mod tokens;
pub mod validator;

pub use challenge::ChallengeIssuer;
pub use service::AuthService;
pub use tokens::{extract_token_from_header, AccessGrant, AccessProps, BackupProps, TokenIssuer};
pub use validator::{ResponseValidator, ValidatedClaimSet};

// =============================================================================
// Token subjects
// =============================================================================

pub const CHALLENGE_SUBJECT: &str = "DIDAuthChallenge";
pub const ACCESS_TOKEN_SUBJECT: &str = "AccessToken";
pub const BACKUP_TOKEN_SUBJECT: &str = "BackupToken";
pub const PAYMENT_PROOF_SUBJECT: &str = "Hive Payment";
pub const RECEIPT_SUBJECT: &str = "Hive Receipt";

/// Subject of a response token answering an auth challenge
pub const AUTH_RESPONSE_SUBJECT: &str = "DIDAuthResponse";

/// Subject of a response token answering a backup-auth challenge
pub const BACKUP_AUTH_RESPONSE_SUBJECT: &str = "DIDBackupAuthResponse";

// =============================================================================
// Configuration
// =============================================================================

/// Default sign-in challenge lifetime
pub const DEFAULT_CHALLENGE_TTL_SECS: i64 = 180;

/// Default access token lifetime cap (30 days)
pub const DEFAULT_ACCESS_TOKEN_TTL_SECS: i64 = 30 * 24 * 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthConfig {
    /// Lifetime of sign-in nonces and response tokens
    pub challenge_ttl_secs: i64,
    /// Upper bound on access and backup token lifetime
    pub access_token_ttl_secs: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            challenge_ttl_secs: DEFAULT_CHALLENGE_TTL_SECS,
            access_token_ttl_secs: DEFAULT_ACCESS_TOKEN_TTL_SECS,
        }
    }
}

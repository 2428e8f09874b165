//! Configuration for the vault node
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::auth::AuthConfig;

/// Vault node - DID challenge-response authentication for a personal data vault
#[derive(Parser, Debug, Clone)]
#[command(name = "vault-node")]
#[command(about = "Personal data vault node with DID authentication")]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:5000")]
    pub listen: SocketAddr,

    /// Enable development mode (ephemeral identity, in-memory nonce store fallback)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "vault_node")]
    pub mongodb_db: String,

    /// Secret the node signing key is derived from (required in production)
    #[arg(long, env = "DID_SECRET", hide_env_values = true)]
    pub did_secret: Option<String>,

    /// Passphrase mixed into key derivation
    #[arg(long, env = "DID_PASSPHRASE", default_value = "", hide_env_values = true)]
    pub did_passphrase: String,

    /// Directory for cached DID documents
    #[arg(long, env = "DID_DATA_DIR", default_value = "./data/did")]
    pub did_data_dir: PathBuf,

    /// Public URL of this node, advertised in its DID document
    /// (e.g., "https://vault.example.com")
    #[arg(long, env = "PUBLIC_URL")]
    pub public_url: Option<String>,

    /// Sign-in challenge lifetime in seconds
    #[arg(long, env = "AUTH_CHALLENGE_EXPIRED", default_value = "180")]
    pub auth_challenge_expired: i64,

    /// Maximum access token lifetime in seconds (default 30 days)
    #[arg(long, env = "ACCESS_TOKEN_EXPIRED", default_value = "2592000")]
    pub access_token_expired: i64,

    /// Timeout for calls to peer vault nodes in milliseconds
    #[arg(long, env = "PEER_TIMEOUT_MS", default_value = "30000")]
    pub peer_timeout_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, env = "LOG_JSON", default_value = "false")]
    pub log_json: bool,
}

impl Args {
    pub fn auth_config(&self) -> AuthConfig {
        AuthConfig {
            challenge_ttl_secs: self.auth_challenge_expired,
            access_token_ttl_secs: self.access_token_expired,
        }
    }

    pub fn peer_timeout(&self) -> Duration {
        Duration::from_millis(self.peer_timeout_ms)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.dev_mode && self.did_secret.as_deref().map_or(true, str::is_empty) {
            return Err("DID_SECRET is required in production mode".to_string());
        }

        if self.auth_challenge_expired <= 0 {
            return Err("AUTH_CHALLENGE_EXPIRED must be positive".to_string());
        }

        if self.access_token_expired <= 0 {
            return Err("ACCESS_TOKEN_EXPIRED must be positive".to_string());
        }

        if self.peer_timeout_ms == 0 {
            return Err("PEER_TIMEOUT_MS must be positive".to_string());
        }

        if let Some(url) = &self.public_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err("PUBLIC_URL must be an http(s) URL".to_string());
            }
        }

        Ok(())
    }
}

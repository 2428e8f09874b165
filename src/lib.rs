//! Vault node - DID challenge-response authentication
//!
//! A personal data vault node authenticates app instances and peer nodes
//! by DID: sign-in issues a signed nonce challenge, auth checks a verifiable
//! presentation answering it and mints a scoped access token.
//!
//! ## Roles
//!
//! - **Server**: sign-in, auth and backup-auth over HTTP
//! - **Federated client**: the same protocol replayed toward a peer node
//!   for backup and restore

pub mod auth;
pub mod clock;
pub mod config;
pub mod db;
pub mod did;
pub mod federation;
pub mod identity;
pub mod nonce;
pub mod routes;
pub mod server;
pub mod types;

#[cfg(test)]
mod testing;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{Result, VaultError};

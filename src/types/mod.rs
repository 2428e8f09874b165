//! Shared types for the vault node

pub mod error;

pub use error::{Result, VaultError};

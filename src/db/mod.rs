//! Database layer for the vault node
//!
//! MongoDB storage for app-instance DID records (nonces and auth audit).
//! Pattern adapted from holo-host/rust/util_libs/db

pub mod mongo;
pub mod schemas;

pub use mongo::{MongoClient, MongoCollection};
pub use schemas::{DidInfoDoc, Metadata};

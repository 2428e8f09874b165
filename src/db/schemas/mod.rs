//! Database schemas for the vault node

mod did_info;
mod metadata;

pub use did_info::{DidInfoDoc, DID_INFO_COLLECTION};
pub use metadata::Metadata;

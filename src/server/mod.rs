//! HTTP server for the vault node

pub mod http;

pub use http::{handle_request, run, AppState};

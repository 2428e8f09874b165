//! HTTP routes for the vault node

pub mod auth_routes;
pub mod health;
pub mod identity;

pub use auth_routes::{handle_auth, handle_backup_auth, handle_sign_in};
pub use health::{about_commit_id, about_version, health_check};
pub use identity::handle_did_document;

use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Response, StatusCode};
use serde::Serialize;

use crate::types::VaultError;

pub const DID_SIGN_IN_PATH: &str = "/api/v2/did/signin";
pub const DID_AUTH_PATH: &str = "/api/v2/did/auth";
pub const DID_BACKUP_AUTH_PATH: &str = "/api/v2/did/backup_auth";
pub const ABOUT_VERSION_PATH: &str = "/api/v2/about/version";
pub const ABOUT_COMMIT_PATH: &str = "/api/v2/about/commit_id";
pub const DID_DOCUMENT_PATH: &str = "/.well-known/did.json";
pub const HEALTH_PATH: &str = "/health";

/// Error body shared by every endpoint
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
}

pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());

    let mut response = Response::new(Full::new(Bytes::from(json)));
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert("Access-Control-Allow-Origin", HeaderValue::from_static("*"));
    headers.insert("Cache-Control", HeaderValue::from_static("no-store"));
    response
}

pub fn json_error_response(err: &VaultError) -> Response<Full<Bytes>> {
    json_response(
        err.status_code(),
        &ErrorResponse {
            error: err.to_string(),
            code: err.code(),
        },
    )
}

#[cfg(test)]
pub(crate) async fn body_json(response: Response<Full<Bytes>>) -> serde_json::Value {
    use http_body_util::BodyExt;

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

//! Health check and about endpoints
//!
//! - /health                  - Liveness check
//! - /api/v2/about/version    - `{major, minor, patch}` of this build
//! - /api/v2/about/commit_id  - Git commit the binary was built from

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;

use super::json_response;
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub version: &'static str,
    /// Uptime in seconds
    pub uptime: u64,
    pub did: String,
    pub mode: &'static str,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct VersionResponse {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

#[derive(Debug, Serialize)]
pub struct CommitResponse {
    pub commit_id: &'static str,
}

pub fn health_check(state: &AppState) -> Response<Full<Bytes>> {
    let response = HealthResponse {
        healthy: true,
        version: env!("CARGO_PKG_VERSION"),
        uptime: state.started_at.elapsed().as_secs(),
        did: state.identity.did().to_string(),
        mode: if state.args.dev_mode { "development" } else { "production" },
    };
    json_response(StatusCode::OK, &response)
}

fn version_part(part: &str) -> u64 {
    part.parse().unwrap_or(0)
}

pub fn about_version() -> Response<Full<Bytes>> {
    let response = VersionResponse {
        major: version_part(env!("CARGO_PKG_VERSION_MAJOR")),
        minor: version_part(env!("CARGO_PKG_VERSION_MINOR")),
        patch: version_part(env!("CARGO_PKG_VERSION_PATCH")),
    };
    json_response(StatusCode::OK, &response)
}

pub fn about_commit_id() -> Response<Full<Bytes>> {
    let response = CommitResponse {
        commit_id: option_env!("GIT_COMMIT_SHORT").unwrap_or("unknown"),
    };
    json_response(StatusCode::OK, &response)
}

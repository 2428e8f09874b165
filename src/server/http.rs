//! HTTP server implementation
//!
//! Uses hyper http1 with TokioIo, one task per connection. Bodies are read
//! into `Bytes` here so route handlers stay socket-free.

use bytes::Bytes;
use http_body_util::{BodyExt, Full, Limited};
use hyper::body::Incoming;
use hyper::header::HeaderValue;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::auth::AuthService;
use crate::config::Args;
use crate::identity::IdentityContext;
use crate::routes::{
    self, ABOUT_COMMIT_PATH, ABOUT_VERSION_PATH, DID_AUTH_PATH, DID_BACKUP_AUTH_PATH,
    DID_DOCUMENT_PATH, DID_SIGN_IN_PATH, HEALTH_PATH,
};
use crate::types::{Result, VaultError};

/// Largest request body accepted (DID documents with a few keys fit easily)
const MAX_BODY_BYTES: usize = 64 * 1024;

/// Shared application state
pub struct AppState {
    pub args: Args,
    /// This node's identity, built once at startup
    pub identity: Arc<IdentityContext>,
    /// Server-role sign-in / auth / backup_auth
    pub auth: Arc<AuthService>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(args: Args, identity: Arc<IdentityContext>, auth: Arc<AuthService>) -> Self {
        Self {
            args,
            identity,
            auth,
            started_at: Instant::now(),
        }
    }
}

/// Run the HTTP server
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        listen = %state.args.listen,
        did = %state.identity.did(),
        "Vault node listening"
    );

    if state.args.dev_mode {
        warn!("Development mode enabled - ephemeral identity and in-memory nonces allowed");
    }

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new()
                        .serve_connection(io, service)
                        .await
                    {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Route incoming HTTP requests
pub async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> std::result::Result<Response<Full<Bytes>>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    debug!(method = %method, path = %path, remote = %addr, "Request");

    let response = match (method, path.as_str()) {
        (Method::OPTIONS, _) => preflight_response(),

        (Method::GET, HEALTH_PATH) | (Method::GET, "/healthz") => routes::health_check(&state),
        (Method::GET, ABOUT_VERSION_PATH) => routes::about_version(),
        (Method::GET, ABOUT_COMMIT_PATH) => routes::about_commit_id(),
        (Method::GET, DID_DOCUMENT_PATH) => routes::handle_did_document(&state),

        (Method::POST, DID_SIGN_IN_PATH) => match read_body(req).await {
            Ok(body) => routes::handle_sign_in(&state, body).await,
            Err(e) => routes::json_error_response(&e),
        },
        (Method::POST, DID_AUTH_PATH) => match read_body(req).await {
            Ok(body) => routes::handle_auth(&state, body).await,
            Err(e) => routes::json_error_response(&e),
        },
        (Method::POST, DID_BACKUP_AUTH_PATH) => match read_body(req).await {
            Ok(body) => routes::handle_backup_auth(&state, body).await,
            Err(e) => routes::json_error_response(&e),
        },

        (_, p) => not_found_response(p),
    };

    Ok(response)
}

async fn read_body(req: Request<Incoming>) -> Result<Bytes> {
    Limited::new(req.into_body(), MAX_BODY_BYTES)
        .collect()
        .await
        .map(|collected| collected.to_bytes())
        .map_err(|e| VaultError::Http(format!("Failed to read body: {}", e)))
}

/// CORS preflight response
fn preflight_response() -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::new()));
    let headers = response.headers_mut();
    headers.insert("Access-Control-Allow-Origin", HeaderValue::from_static("*"));
    headers.insert(
        "Access-Control-Allow-Headers",
        HeaderValue::from_static("Content-Type, Authorization"),
    );
    headers.insert(
        "Access-Control-Allow-Methods",
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    response
}

fn not_found_response(path: &str) -> Response<Full<Bytes>> {
    routes::json_response(
        StatusCode::NOT_FOUND,
        &json!({
            "error": "Not Found",
            "code": "NOT_FOUND",
            "path": path,
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::body_json;

    #[test]
    fn test_preflight_allows_post() {
        let response = preflight_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("Access-Control-Allow-Methods").unwrap(),
            "GET, POST, OPTIONS"
        );
    }

    #[tokio::test]
    async fn test_not_found_names_path() {
        let response = not_found_response("/api/v2/nope");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["path"], "/api/v2/nope");
    }
}

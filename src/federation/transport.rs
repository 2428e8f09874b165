//! Transport to peer vault nodes

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::types::{Result, VaultError};

#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// POST a JSON body to `url` and return the JSON body of a 2xx reply.
    ///
    /// Transport failures, non-2xx statuses and non-JSON replies are all
    /// `Upstream` errors.
    async fn post_json(&self, url: &str, body: &Value) -> Result<Value>;
}

/// HTTP transport with a client-level timeout
pub struct HttpPeerTransport {
    client: reqwest::Client,
}

impl HttpPeerTransport {
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("vault-node/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self { client }
    }
}

#[async_trait]
impl PeerTransport for HttpPeerTransport {
    async fn post_json(&self, url: &str, body: &Value) -> Result<Value> {
        debug!(url = %url, "Calling peer node");

        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| VaultError::Upstream(format!("{}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(VaultError::Upstream(format!(
                "HTTP {} from {}: {}",
                status, url, detail
            )));
        }

        response
            .json()
            .await
            .map_err(|e| VaultError::Upstream(format!("invalid reply from {}: {}", url, e)))
    }
}

/// Join a peer base URL and an endpoint path
pub fn peer_url(host: &str, path: &str) -> String {
    format!("{}{}", host.trim_end_matches('/'), path)
}

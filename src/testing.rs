//! Test fixtures: in-process nodes, holder identities and peer transports

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use clap::Parser;
use dashmap::DashMap;
use ed25519_dalek::SigningKey;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::auth::{AuthConfig, AuthService, ChallengeIssuer, ResponseValidator, TokenIssuer};
use crate::auth::AUTH_RESPONSE_SUBJECT;
use crate::clock::ManualClock;
use crate::config::Args;
use crate::did::{
    Credential, DidDocument, DidResolver, DidToolkit, JwsToolkit, MemoryDocumentCache,
};
use crate::federation::client::build_challenge_response;
use crate::federation::{FederatedClient, PeerTransport};
use crate::identity::IdentityContext;
use crate::nonce::MemoryNonceStore;
use crate::routes::{DID_AUTH_PATH, DID_BACKUP_AUTH_PATH, DID_SIGN_IN_PATH};
use crate::server::AppState;
use crate::types::{Result, VaultError};

/// Fixed start time for every test clock
pub const T0: i64 = 1_700_000_000;

/// Identity under `did` with a deterministic key
pub fn holder(did: &str, seed: u8) -> IdentityContext {
    IdentityContext::new(did, SigningKey::from_bytes(&[seed; 32])).unwrap()
}

/// Toolkit for signing outside any node
fn offline_toolkit() -> JwsToolkit {
    JwsToolkit::new(
        Arc::new(DidResolver::new(Arc::new(MemoryDocumentCache::new()))),
        Arc::new(ManualClock::new(T0)),
    )
}

/// The user behind every test credential; a did:key, so any node can
/// resolve it
pub fn user() -> IdentityContext {
    IdentityContext::from_signing_key(SigningKey::from_bytes(&[0x55; 32]))
}

/// Unsigned credential from `user()` about `subject`
pub fn user_credential(subject: &str) -> Credential {
    Credential::new(user().did(), subject)
}

/// Sign `credential` as `user()`
pub fn issue(credential: Credential) -> Credential {
    offline_toolkit().sign_credential(&user(), credential).unwrap()
}

/// Signed auth response from `holder` answering `nonce` issued by `realm`
pub fn respond(
    holder: &IdentityContext,
    realm: &str,
    nonce: &str,
    credentials: &[Credential],
    exp: i64,
) -> String {
    build_challenge_response(
        &offline_toolkit(),
        holder,
        realm,
        nonce,
        credentials,
        AUTH_RESPONSE_SUBJECT,
        exp,
    )
    .unwrap()
}

/// A vault node wired entirely in memory with a manual clock at `T0`
pub struct Node {
    pub identity: Arc<IdentityContext>,
    pub toolkit: Arc<JwsToolkit>,
    pub nonces: Arc<MemoryNonceStore>,
    pub documents: Arc<MemoryDocumentCache>,
    pub clock: Arc<ManualClock>,
    pub auth: Arc<AuthService>,
}

impl Node {
    pub fn new(did: &str) -> Self {
        let seed: [u8; 32] = Sha256::digest(did.as_bytes()).into();
        let identity = Arc::new(IdentityContext::new(did, SigningKey::from_bytes(&seed)).unwrap());

        let documents = Arc::new(MemoryDocumentCache::new());
        documents.insert(identity.document());

        let clock = Arc::new(ManualClock::new(T0));
        let resolver = Arc::new(DidResolver::new(documents.clone()));
        let toolkit = Arc::new(JwsToolkit::new(resolver, clock.clone()));
        let nonces = Arc::new(MemoryNonceStore::new());

        let auth = Arc::new(AuthService::new(
            identity.clone(),
            toolkit.clone(),
            nonces.clone(),
            documents.clone(),
            clock.clone(),
            AuthConfig::default(),
        ));

        Self {
            identity,
            toolkit,
            nonces,
            documents,
            clock,
            auth,
        }
    }

    pub fn challenges(&self) -> &ChallengeIssuer {
        self.auth.challenges()
    }

    pub fn validator(&self) -> &ResponseValidator {
        self.auth.validator()
    }

    pub fn tokens(&self) -> &TokenIssuer {
        self.auth.tokens()
    }

    /// Make another party's document resolvable by this node
    pub fn learn(&self, document: &DidDocument) {
        self.documents.insert(document);
    }

    pub fn federated_client(&self, transport: Arc<dyn PeerTransport>) -> FederatedClient {
        FederatedClient::new(
            self.identity.clone(),
            self.toolkit.clone(),
            transport,
            self.clock.clone(),
            AuthConfig::default().challenge_ttl_secs,
        )
    }

    /// HTTP state around this node's auth service
    pub fn app_state(&self) -> AppState {
        let args = Args::parse_from(["vault-node", "--dev-mode"]);
        AppState::new(args, self.identity.clone(), self.auth.clone())
    }
}

/// Transport that dispatches to in-process nodes by host
#[derive(Default)]
pub struct LoopbackTransport {
    nodes: DashMap<String, Arc<Node>>,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mount(&self, host: &str, node: Arc<Node>) {
        self.nodes.insert(host.trim_end_matches('/').to_string(), node);
    }

    fn route(&self, url: &str) -> Option<(Arc<Node>, String)> {
        self.nodes.iter().find_map(|entry| {
            url.strip_prefix(entry.key().as_str())
                .map(|path| (entry.value().clone(), path.to_string()))
        })
    }
}

fn field<'a>(body: &'a Value, name: &str) -> Result<&'a Value> {
    body.get(name)
        .ok_or_else(|| VaultError::BadRequest(format!("missing {}", name)))
}

async fn dispatch(node: &Node, path: &str, body: &Value) -> Result<Value> {
    match path {
        DID_SIGN_IN_PATH => {
            let challenge = node.auth.sign_in(field(body, "id")?).await?;
            Ok(serde_json::json!({ "challenge": challenge }))
        }
        DID_AUTH_PATH | DID_BACKUP_AUTH_PATH => {
            let response = field(body, "challenge_response")?
                .as_str()
                .unwrap_or_default();
            let token = if path == DID_AUTH_PATH {
                node.auth.auth(response).await?
            } else {
                node.auth.backup_auth(response).await?
            };
            Ok(serde_json::json!({ "token": token }))
        }
        other => Err(VaultError::NotFound(other.to_string())),
    }
}

#[async_trait]
impl PeerTransport for LoopbackTransport {
    async fn post_json(&self, url: &str, body: &Value) -> Result<Value> {
        let (node, path) = self
            .route(url)
            .ok_or_else(|| VaultError::Upstream(format!("no route to {}", url)))?;

        dispatch(&node, &path, body).await.map_err(|e| {
            VaultError::Upstream(format!("HTTP {} from {}: {}", e.status_code(), url, e))
        })
    }
}

/// Transport that replays canned replies in order
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<Value>>,
}

impl ScriptedTransport {
    pub fn new(replies: Vec<Value>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
        }
    }
}

#[async_trait]
impl PeerTransport for ScriptedTransport {
    async fn post_json(&self, url: &str, _body: &Value) -> Result<Value> {
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| VaultError::Upstream(format!("no scripted reply for {}", url)))
    }
}

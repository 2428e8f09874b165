//! Federated client

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::info;

use super::handshake::{Handshake, HandshakeState};
use super::transport::{peer_url, PeerTransport};
use crate::auth::{AUTH_RESPONSE_SUBJECT, BACKUP_AUTH_RESPONSE_SUBJECT};
use crate::clock::Clock;
use crate::did::{Credential, DidToolkit, ParsedToken, Presentation, TokenClaims};
use crate::identity::IdentityContext;
use crate::routes::{DID_AUTH_PATH, DID_BACKUP_AUTH_PATH, DID_SIGN_IN_PATH};
use crate::types::{Result, VaultError};

/// Signed answer to a peer's challenge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerChallenge {
    pub challenge_response: String,
    /// Issuer of the challenge
    pub peer_did: String,
}

/// Token obtained from a peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerSession {
    pub peer_did: String,
    pub token: String,
}

/// Backup target named by a backup credential
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupCredentialInfo {
    pub source_did: String,
    pub target_host: String,
    pub target_did: String,
}

pub struct FederatedClient {
    identity: Arc<IdentityContext>,
    toolkit: Arc<dyn DidToolkit>,
    transport: Arc<dyn PeerTransport>,
    clock: Arc<dyn Clock>,
    challenge_ttl_secs: i64,
}

/// Sign a response token answering a challenge: a presentation of
/// `credentials` bound to the peer (`realm`) and its `nonce`.
pub fn build_challenge_response(
    toolkit: &dyn DidToolkit,
    identity: &IdentityContext,
    peer_did: &str,
    nonce: &str,
    credentials: &[Credential],
    subject: &str,
    exp: i64,
) -> Result<String> {
    let presentation = Presentation::new(identity.did(), peer_did, nonce, credentials);
    let claims = TokenClaims {
        presentation: Some(presentation.to_value()),
        ..TokenClaims::new(identity.did(), peer_did, subject)
    }
    .expires_at(exp);
    Ok(toolkit.sign_and_compact(identity, &claims)?)
}

fn reply_field<'a>(reply: &'a Value, field: &str, url: &str) -> Result<&'a str> {
    reply
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| VaultError::Upstream(format!("reply from {} has no {}", url, field)))
}

impl FederatedClient {
    pub fn new(
        identity: Arc<IdentityContext>,
        toolkit: Arc<dyn DidToolkit>,
        transport: Arc<dyn PeerTransport>,
        clock: Arc<dyn Clock>,
        challenge_ttl_secs: i64,
    ) -> Self {
        Self {
            identity,
            toolkit,
            transport,
            clock,
            challenge_ttl_secs,
        }
    }

    async fn parse_peer_token(&self, token: &str, url: &str) -> Result<ParsedToken> {
        self.toolkit
            .parse_token(token)
            .await
            .map_err(|e| VaultError::Upstream(format!("unverifiable token from {}: {}", url, e)))
    }

    /// Sign in to `host` with this node's document and answer its challenge
    /// with a presentation of `credential`.
    pub async fn sign_in_to_peer(
        &self,
        host: &str,
        credential: &Credential,
        subject: &str,
    ) -> Result<PeerChallenge> {
        let mut handshake = Handshake::new(host);
        let result = self
            .sign_in_steps(&mut handshake, host, credential, subject)
            .await;
        result.map_err(|e| handshake.fail(e))
    }

    async fn sign_in_steps(
        &self,
        handshake: &mut Handshake,
        host: &str,
        credential: &Credential,
        subject: &str,
    ) -> Result<PeerChallenge> {
        let url = peer_url(host, DID_SIGN_IN_PATH);

        handshake.advance(HandshakeState::SignInSent)?;
        let reply = self
            .transport
            .post_json(&url, &json!({ "id": self.identity.document() }))
            .await?;

        let challenge = reply_field(&reply, "challenge", &url)?;
        let challenge = self.parse_peer_token(challenge, &url).await?;
        handshake.advance(HandshakeState::ChallengeReceived)?;

        if challenge.audience() != self.identity.did() {
            return Err(VaultError::InvalidParameter(format!(
                "challenge from {} is addressed to {}",
                host,
                challenge.audience()
            )));
        }
        let nonce = challenge
            .nonce()
            .filter(|n| !n.is_empty())
            .ok_or_else(|| VaultError::Upstream(format!("challenge from {} has no nonce", host)))?;
        let peer_did = challenge.issuer().to_string();

        let challenge_response = build_challenge_response(
            self.toolkit.as_ref(),
            &self.identity,
            &peer_did,
            nonce,
            std::slice::from_ref(credential),
            subject,
            self.clock.now_secs() + self.challenge_ttl_secs,
        )?;
        handshake.advance(HandshakeState::PresentationBuilt)?;

        Ok(PeerChallenge {
            challenge_response,
            peer_did,
        })
    }

    /// Exchange a challenge response for an access token issued by the peer
    pub async fn auth_with_peer(
        &self,
        host: &str,
        challenge_response: &str,
        expected_peer_did: &str,
    ) -> Result<String> {
        self.exchange(host, DID_AUTH_PATH, challenge_response, expected_peer_did)
            .await
    }

    /// Exchange a challenge response for a backup token issued by the peer
    pub async fn backup_auth_with_peer(
        &self,
        host: &str,
        challenge_response: &str,
        expected_peer_did: &str,
    ) -> Result<String> {
        self.exchange(host, DID_BACKUP_AUTH_PATH, challenge_response, expected_peer_did)
            .await
    }

    async fn exchange(
        &self,
        host: &str,
        path: &str,
        challenge_response: &str,
        expected_peer_did: &str,
    ) -> Result<String> {
        let mut handshake = Handshake::resume(host, HandshakeState::PresentationBuilt);
        let result = self
            .exchange_steps(&mut handshake, host, path, challenge_response, expected_peer_did)
            .await;
        result.map_err(|e| handshake.fail(e))
    }

    async fn exchange_steps(
        &self,
        handshake: &mut Handshake,
        host: &str,
        path: &str,
        challenge_response: &str,
        expected_peer_did: &str,
    ) -> Result<String> {
        let url = peer_url(host, path);

        handshake.advance(HandshakeState::ResponseSent)?;
        let reply = self
            .transport
            .post_json(&url, &json!({ "challenge_response": challenge_response }))
            .await?;

        let raw = reply_field(&reply, "token", &url)?;
        let token = self.parse_peer_token(raw, &url).await?;

        if token.audience() != self.identity.did() {
            return Err(VaultError::InvalidParameter(format!(
                "token from {} is addressed to {}",
                host,
                token.audience()
            )));
        }
        if token.issuer() != expected_peer_did {
            return Err(VaultError::InvalidParameter(format!(
                "token from {} was issued by {}, expected {}",
                host,
                token.issuer(),
                expected_peer_did
            )));
        }
        handshake.advance(HandshakeState::TokenReceived)?;

        Ok(raw.to_string())
    }

    /// Read the backup target out of a backup credential
    pub fn get_backup_credential_info(&self, credential: &Value) -> Result<BackupCredentialInfo> {
        let credential = self
            .toolkit
            .parse_credential(credential)
            .map_err(|e| VaultError::InvalidParameter(format!("The backup credential is invalid: {}", e)))?;

        let prop = |name: &str| -> Result<String> {
            credential
                .subject_prop(name)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .ok_or_else(|| {
                    VaultError::InvalidParameter(format!("The backup credential has no {}", name))
                })
        };

        Ok(BackupCredentialInfo {
            source_did: prop("sourceDID")?,
            target_host: prop("targetHost")?,
            target_did: prop("targetDID")?,
        })
    }

    /// Obtain a backup token from the node named by a backup credential
    pub async fn authorize_backup(&self, credential: &Value) -> Result<PeerSession> {
        let info = self.get_backup_credential_info(credential)?;
        let parsed = self
            .toolkit
            .parse_credential(credential)
            .map_err(|e| VaultError::InvalidParameter(e.to_string()))?;

        let challenge = self
            .sign_in_to_peer(&info.target_host, &parsed, BACKUP_AUTH_RESPONSE_SUBJECT)
            .await?;
        if challenge.peer_did != info.target_did {
            return Err(VaultError::InvalidParameter(format!(
                "{} answered as {}, the credential names {}",
                info.target_host, challenge.peer_did, info.target_did
            )));
        }

        let token = self
            .backup_auth_with_peer(&info.target_host, &challenge.challenge_response, &challenge.peer_did)
            .await?;

        info!(peer_did = %challenge.peer_did, host = %info.target_host, "Authorized backup with peer");
        Ok(PeerSession {
            peer_did: challenge.peer_did,
            token,
        })
    }

    /// Full sign-in and auth against a peer, returning its access token
    pub async fn access_peer(&self, host: &str, credential: &Credential) -> Result<PeerSession> {
        let challenge = self
            .sign_in_to_peer(host, credential, AUTH_RESPONSE_SUBJECT)
            .await?;
        let token = self
            .auth_with_peer(host, &challenge.challenge_response, &challenge.peer_did)
            .await?;
        Ok(PeerSession {
            peer_did: challenge.peer_did,
            token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::did::DocumentCache;
    use crate::testing::{
        holder, issue, user, user_credential, LoopbackTransport, Node, ScriptedTransport, T0,
    };
    use std::sync::Arc;

    const CLIENT: &str = "did:example:source";
    const PEER: &str = "did:example:target";
    const PEER_HOST: &str = "https://target.example.com";

    fn backup_credential() -> Credential {
        issue(
            user_credential(CLIENT)
                .with_claim("sourceDID", CLIENT)
                .with_claim("targetHost", PEER_HOST)
                .with_claim("targetDID", PEER)
                .with_expiration(T0 + 3600),
        )
    }

    /// Client and peer nodes wired through an in-process transport
    fn federation() -> (Node, Arc<Node>, FederatedClient) {
        let client = Node::new(CLIENT);
        let peer = Arc::new(Node::new(PEER));
        client.learn(peer.identity.document());

        let transport = Arc::new(LoopbackTransport::new());
        transport.mount(PEER_HOST, peer.clone());

        let federated = client.federated_client(transport);
        (client, peer, federated)
    }

    #[tokio::test]
    async fn test_authorize_backup_end_to_end() {
        let (client, peer, federated) = federation();

        let session = federated
            .authorize_backup(&backup_credential().to_value())
            .await
            .unwrap();
        assert_eq!(session.peer_did, PEER);

        let token = peer.toolkit.parse_token(&session.token).await.unwrap();
        assert_eq!(token.subject(), "BackupToken");
        assert_eq!(token.audience(), CLIENT);

        // The peer learned the client's document at sign-in
        assert!(peer.documents.load(CLIENT).await.unwrap().is_some());
        // Nothing is written locally
        assert!(client.nonces.is_empty());
    }

    #[tokio::test]
    async fn test_access_peer() {
        let (_, peer, federated) = federation();
        let credential = issue(
            user_credential(CLIENT)
                .with_claim("appDid", "did:example:appdid")
                .with_expiration(T0 + 3600),
        );

        let session = federated.access_peer(PEER_HOST, &credential).await.unwrap();
        let token = peer.tokens().verify_access_token(&session.token).await.unwrap();
        assert_eq!(token.app_instance_did, CLIENT);
        assert_eq!(token.props.user_did, user().did());
    }

    #[tokio::test]
    async fn test_sign_in_challenge_for_someone_else() {
        let client = Node::new(CLIENT);
        let peer = Node::new(PEER);
        client.learn(peer.identity.document());

        let foreign = peer
            .identity
            .sign_token(&TokenClaims {
                nonce: Some("n-1".into()),
                ..TokenClaims::new(PEER, "did:example:other", "DIDAuthChallenge")
            })
            .unwrap();
        let transport = Arc::new(ScriptedTransport::new(vec![json!({ "challenge": foreign })]));
        let federated = client.federated_client(transport);

        let err = federated
            .sign_in_to_peer(PEER_HOST, &backup_credential(), BACKUP_AUTH_RESPONSE_SUBJECT)
            .await
            .unwrap_err();
        assert!(matches!(err, VaultError::InvalidParameter(_)));
    }

    #[tokio::test]
    async fn test_token_from_unexpected_issuer() {
        let client = Node::new(CLIENT);
        let peer = Node::new(PEER);
        let impostor = Node::new("did:example:impostor");
        client.learn(peer.identity.document());
        client.learn(impostor.identity.document());

        let token = impostor
            .identity
            .sign_token(&TokenClaims::new("did:example:impostor", CLIENT, "AccessToken"))
            .unwrap();
        let transport = Arc::new(ScriptedTransport::new(vec![json!({ "token": token })]));
        let federated = client.federated_client(transport);

        let err = federated
            .auth_with_peer(PEER_HOST, "response", PEER)
            .await
            .unwrap_err();
        assert!(matches!(err, VaultError::InvalidParameter(_)));
    }

    #[tokio::test]
    async fn test_forged_did_web_peer_token_rejected() {
        let client = Node::new(CLIENT);
        let peer_did = "did:web:localhost%3A1";

        // Someone signed in to this node under the peer's did:web
        let impostor = holder(peer_did, 41);
        client
            .challenges()
            .sign_in(&impostor.document().to_value())
            .await
            .unwrap();

        let token = impostor
            .sign_token(&TokenClaims::new(peer_did, CLIENT, "AccessToken"))
            .unwrap();
        let transport = Arc::new(ScriptedTransport::new(vec![json!({ "token": token })]));
        let federated = client.federated_client(transport);

        assert!(federated
            .auth_with_peer(PEER_HOST, "response", peer_did)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_token_for_another_audience() {
        let client = Node::new(CLIENT);
        let peer = Node::new(PEER);
        client.learn(peer.identity.document());

        let token = peer
            .identity
            .sign_token(&TokenClaims::new(PEER, "did:example:other", "AccessToken"))
            .unwrap();
        let transport = Arc::new(ScriptedTransport::new(vec![json!({ "token": token })]));
        let federated = client.federated_client(transport);

        let err = federated
            .auth_with_peer(PEER_HOST, "response", PEER)
            .await
            .unwrap_err();
        assert!(matches!(err, VaultError::InvalidParameter(_)));
    }

    #[tokio::test]
    async fn test_malformed_peer_replies_are_upstream() {
        let client = Node::new(CLIENT);
        let transport = Arc::new(ScriptedTransport::new(vec![
            json!({ "unexpected": true }),
            json!({ "token": "not-a-token" }),
        ]));
        let federated = client.federated_client(transport);

        let err = federated
            .sign_in_to_peer(PEER_HOST, &backup_credential(), BACKUP_AUTH_RESPONSE_SUBJECT)
            .await
            .unwrap_err();
        assert!(matches!(err, VaultError::Upstream(_)));

        let err = federated
            .auth_with_peer(PEER_HOST, "response", PEER)
            .await
            .unwrap_err();
        assert!(matches!(err, VaultError::Upstream(_)));
    }

    #[tokio::test]
    async fn test_peer_rejection_is_upstream() {
        let (_, _, federated) = federation();
        // The peer answers 400 to a response it never challenged
        let err = federated
            .auth_with_peer(PEER_HOST, "garbage", PEER)
            .await
            .unwrap_err();
        assert!(matches!(err, VaultError::Upstream(_)));
    }

    #[tokio::test]
    async fn test_peer_answering_as_other_did() {
        let (_, _, federated) = federation();
        let credential = issue(
            user_credential(CLIENT)
                .with_claim("sourceDID", CLIENT)
                .with_claim("targetHost", PEER_HOST)
                .with_claim("targetDID", "did:example:elsewhere")
                .with_expiration(T0 + 3600),
        );

        let err = federated
            .authorize_backup(&credential.to_value())
            .await
            .unwrap_err();
        assert!(matches!(err, VaultError::InvalidParameter(_)));
    }

    #[test]
    fn test_backup_credential_info() {
        let client = Node::new(CLIENT);
        let federated = client.federated_client(Arc::new(ScriptedTransport::new(vec![])));

        let info = federated
            .get_backup_credential_info(&backup_credential().to_value())
            .unwrap();
        assert_eq!(
            info,
            BackupCredentialInfo {
                source_did: CLIENT.into(),
                target_host: PEER_HOST.into(),
                target_did: PEER.into(),
            }
        );

        let no_host = user_credential(CLIENT)
            .with_claim("sourceDID", CLIENT)
            .with_claim("targetDID", PEER);
        let err = federated
            .get_backup_credential_info(&no_host.to_value())
            .unwrap_err();
        assert!(matches!(err, VaultError::InvalidParameter(ref m) if m.contains("targetHost")));

        assert!(matches!(
            federated.get_backup_credential_info(&json!({"issuer": user().did()})),
            Err(VaultError::InvalidParameter(_))
        ));
    }
}

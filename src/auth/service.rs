//! Auth service
//!
//! Server-role entry points: sign-in, auth and backup-auth. Wires the
//! challenge issuer, response validator and token issuer to one identity,
//! nonce store and clock.

use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use super::challenge::ChallengeIssuer;
use super::tokens::TokenIssuer;
use super::validator::{ResponseValidator, ValidatedClaimSet};
use super::AuthConfig;
use crate::clock::Clock;
use crate::did::{DidToolkit, DocumentCache};
use crate::identity::IdentityContext;
use crate::nonce::{AccessTokenRecord, NonceStore};
use crate::types::{Result, VaultError};

pub struct AuthService {
    identity: Arc<IdentityContext>,
    challenges: ChallengeIssuer,
    validator: ResponseValidator,
    tokens: TokenIssuer,
    nonces: Arc<dyn NonceStore>,
    clock: Arc<dyn Clock>,
}

impl AuthService {
    pub fn new(
        identity: Arc<IdentityContext>,
        toolkit: Arc<dyn DidToolkit>,
        nonces: Arc<dyn NonceStore>,
        documents: Arc<dyn DocumentCache>,
        clock: Arc<dyn Clock>,
        config: AuthConfig,
    ) -> Self {
        Self {
            challenges: ChallengeIssuer::new(
                identity.clone(),
                toolkit.clone(),
                nonces.clone(),
                documents,
                clock.clone(),
                config.challenge_ttl_secs,
            ),
            validator: ResponseValidator::new(
                identity.clone(),
                toolkit.clone(),
                nonces.clone(),
                clock.clone(),
                config.access_token_ttl_secs,
            ),
            tokens: TokenIssuer::new(identity.clone(), toolkit),
            identity,
            nonces,
            clock,
        }
    }

    pub fn identity(&self) -> &Arc<IdentityContext> {
        &self.identity
    }

    pub fn challenges(&self) -> &ChallengeIssuer {
        &self.challenges
    }

    pub fn validator(&self) -> &ResponseValidator {
        &self.validator
    }

    pub fn tokens(&self) -> &TokenIssuer {
        &self.tokens
    }

    pub async fn sign_in(&self, document: &Value) -> Result<String> {
        self.challenges.sign_in(document).await
    }

    /// Validate a challenge response and mint an access token.
    ///
    /// The issued token is recorded on the app-instance record for audit;
    /// a failed audit write does not fail the call.
    pub async fn auth(&self, response: &str) -> Result<String> {
        let claims = self.validator.validate_auth(response).await?;
        self.ensure_lifetime(&claims)?;

        let token = self.tokens.create_access_token(&claims)?;

        let audit = AccessTokenRecord {
            app_instance_did: claims.id.clone(),
            user_did: claims.user_did.clone(),
            app_did: claims.prop("appDid").unwrap_or_default().to_string(),
            access_token: token.clone(),
            expires_at: claims.exp_time,
        };
        if let Err(e) = self.nonces.record_access_token(&audit).await {
            warn!(app_instance_did = %claims.id, error = %e, "Failed to record issued access token");
        }

        info!(
            app_instance_did = %claims.id,
            user_did = %claims.user_did,
            expires_at = claims.exp_time,
            "Issued access token"
        );
        Ok(token)
    }

    /// Validate a challenge response from a peer node and mint a backup token
    pub async fn backup_auth(&self, response: &str) -> Result<String> {
        let claims = self.validator.validate_backup(response).await?;
        self.ensure_lifetime(&claims)?;

        let token = self.tokens.create_backup_token(&claims)?;

        info!(
            app_instance_did = %claims.id,
            user_did = %claims.user_did,
            expires_at = claims.exp_time,
            "Issued backup token"
        );
        Ok(token)
    }

    /// A credential that expired at or before now leaves nothing to mint
    fn ensure_lifetime(&self, claims: &ValidatedClaimSet) -> Result<()> {
        if claims.remaining_lifetime(self.clock.now_secs()) <= 0 {
            return Err(VaultError::BadRequest("The credential is expired".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AccessProps;
    use crate::testing::{holder, issue, respond, user, user_credential, Node, T0};
    use tokio_test::{assert_err, assert_ok};

    const NODE: &str = "did:example:abc";
    const APP: &str = "did:example:app1";

    async fn challenge_nonce(node: &Node, app: &IdentityContext) -> String {
        let challenge = node.auth.sign_in(&app.document().to_value()).await.unwrap();
        let parsed = node.toolkit.parse_token(&challenge).await.unwrap();
        parsed.nonce().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_worked_example() {
        let node = Node::new(NODE);
        let app = holder(APP, 31);

        // t0: sign-in
        let challenge = node.auth.sign_in(&app.document().to_value()).await.unwrap();
        let parsed = node.toolkit.parse_token(&challenge).await.unwrap();
        assert_eq!(parsed.audience(), APP);
        assert_eq!(parsed.claims.exp, Some(T0 + 180));
        let nonce = parsed.nonce().unwrap().to_string();

        // t0 + 10: auth
        node.clock.set(T0 + 10);
        let credential = issue(
            user_credential(APP)
                .with_claim("appDid", "did:example:appdid")
                .with_expiration(T0 + 3600),
        );
        let response = respond(&app, NODE, &nonce, &[credential], T0 + 190);
        let token = node.auth.auth(&response).await.unwrap();

        let access = node.toolkit.parse_token(&token).await.unwrap();
        assert_eq!(access.issuer(), NODE);
        assert_eq!(access.audience(), APP);
        assert_eq!(access.subject(), "AccessToken");
        assert_eq!(access.claims.exp, Some(T0 + 3600));
        let props: AccessProps = serde_json::from_str(access.claims.props.as_deref().unwrap()).unwrap();
        assert_eq!(
            props,
            AccessProps {
                user_did: user().did().into(),
                app_did: "did:example:appdid".into(),
                nonce,
            }
        );

        // Audit trail
        let audit = node.nonces.access_token(APP).await.unwrap().unwrap();
        assert_eq!(audit.access_token, token);
        assert_eq!(audit.user_did, user().did());
        assert_eq!(audit.app_did, "did:example:appdid");
        assert_eq!(audit.expires_at, T0 + 3600);
    }

    #[tokio::test]
    async fn test_expired_credential_boundary() {
        let node = Node::new(NODE);
        let app = holder(APP, 31);
        let nonce = challenge_nonce(&node, &app).await;
        node.clock.set(T0 + 10);

        let expiring_now = issue(
            user_credential(APP)
                .with_claim("appDid", "did:example:appdid")
                .with_expiration(T0 + 10),
        );
        let response = respond(&app, NODE, &nonce, &[expiring_now], T0 + 180);
        assert!(matches!(
            node.auth.auth(&response).await,
            Err(VaultError::BadRequest(_))
        ));

        let one_second_left = issue(
            user_credential(APP)
                .with_claim("appDid", "did:example:appdid")
                .with_expiration(T0 + 11),
        );
        let response = respond(&app, NODE, &nonce, &[one_second_left], T0 + 180);
        let token = node.auth.auth(&response).await.unwrap();
        let parsed = node.toolkit.parse_token(&token).await.unwrap();
        assert_eq!(parsed.claims.exp, Some(T0 + 11));
    }

    #[tokio::test]
    async fn test_nonce_reusable_until_expiry() {
        let node = Node::new(NODE);
        let app = holder(APP, 31);
        let nonce = challenge_nonce(&node, &app).await;
        let credential = issue(
            user_credential(APP)
                .with_claim("appDid", "did:example:appdid")
                .with_expiration(T0 + 3600),
        );
        let response = respond(&app, NODE, &nonce, &[credential], T0 + 180);

        assert_ok!(node.auth.auth(&response).await);
        assert_ok!(node.auth.auth(&response).await);
    }

    #[tokio::test]
    async fn test_backup_auth() {
        let node = Node::new(NODE);
        let peer = holder("did:example:peer", 32);
        let nonce = challenge_nonce(&node, &peer).await;

        let credential = issue(
            user_credential("did:example:peer")
                .with_claim("sourceDID", "did:example:peer")
                .with_claim("targetHost", "https://backup.example.com")
                .with_claim("targetDID", NODE)
                .with_expiration(T0 + 3600),
        );
        let response = respond(&peer, NODE, &nonce, &[credential], T0 + 180);

        let token = node.auth.backup_auth(&response).await.unwrap();
        let parsed = node.toolkit.parse_token(&token).await.unwrap();
        assert_eq!(parsed.subject(), "BackupToken");
        assert_eq!(parsed.audience(), "did:example:peer");

        // An access credential cannot be used for backup
        let access_only = issue(
            user_credential("did:example:peer")
                .with_claim("appDid", "did:example:appdid")
                .with_expiration(T0 + 3600),
        );
        let response = respond(&peer, NODE, &nonce, &[access_only], T0 + 180);
        assert_err!(node.auth.backup_auth(&response).await);

        // Backup auth writes no audit record
        assert!(node.nonces.access_token("did:example:peer").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_sign_ins_last_write_wins() {
        let node = std::sync::Arc::new(Node::new(NODE));
        let app = std::sync::Arc::new(holder(APP, 31));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let node = node.clone();
            let app = app.clone();
            handles.push(tokio::spawn(async move {
                node.auth.sign_in(&app.document().to_value()).await
            }));
        }
        let mut nonces = Vec::new();
        for handle in handles {
            let challenge = handle.await.unwrap().unwrap();
            let parsed = node.toolkit.parse_token(&challenge).await.unwrap();
            nonces.push(parsed.nonce().unwrap().to_string());
        }

        let stored = node.nonces.get(APP).await.unwrap().unwrap();
        assert!(nonces.contains(&stored.nonce));
        assert_eq!(node.nonces.len(), 1);

        // Only the surviving nonce authenticates
        let credential = issue(
            user_credential(APP)
                .with_claim("appDid", "did:example:appdid")
                .with_expiration(T0 + 3600),
        );
        for nonce in &nonces {
            let response = respond(&app, NODE, nonce, &[credential.clone()], T0 + 180);
            assert_eq!(node.auth.auth(&response).await.is_ok(), *nonce == stored.nonce);
        }
    }
}

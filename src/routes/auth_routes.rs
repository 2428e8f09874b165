//! DID authentication endpoints
//!
//! - POST /api/v2/did/signin       `{"id": <DID document>}` -> `{"challenge"}`
//! - POST /api/v2/did/auth         `{"challenge_response"}` -> `{"token"}`
//! - POST /api/v2/did/backup_auth  `{"challenge_response"}` -> `{"token"}`

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::{json_error_response, json_response};
use crate::server::AppState;
use crate::types::{Result, VaultError};

#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    pub id: Value,
}

#[derive(Debug, Serialize)]
pub struct SignInResponse {
    pub challenge: String,
}

#[derive(Debug, Deserialize)]
pub struct AuthRequest {
    pub challenge_response: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

fn parse_body<'a, T: Deserialize<'a>>(body: &'a [u8]) -> Result<T> {
    if body.is_empty() {
        return Err(VaultError::BadRequest("Request body is empty".into()));
    }
    serde_json::from_slice(body).map_err(|e| VaultError::BadRequest(format!("Invalid JSON: {}", e)))
}

fn respond<T: Serialize>(result: Result<T>) -> Response<Full<Bytes>> {
    match result {
        Ok(body) => json_response(StatusCode::OK, &body),
        Err(e) => {
            debug!(error = %e, "DID auth request rejected");
            json_error_response(&e)
        }
    }
}

async fn sign_in(state: &AppState, body: &[u8]) -> Result<SignInResponse> {
    let request: SignInRequest = parse_body(body)?;
    let challenge = state.auth.sign_in(&request.id).await?;
    Ok(SignInResponse { challenge })
}

async fn auth(state: &AppState, body: &[u8], backup: bool) -> Result<TokenResponse> {
    let request: AuthRequest = parse_body(body)?;
    let token = if backup {
        state.auth.backup_auth(&request.challenge_response).await?
    } else {
        state.auth.auth(&request.challenge_response).await?
    };
    Ok(TokenResponse { token })
}

pub async fn handle_sign_in(state: &AppState, body: Bytes) -> Response<Full<Bytes>> {
    respond(sign_in(state, &body).await)
}

pub async fn handle_auth(state: &AppState, body: Bytes) -> Response<Full<Bytes>> {
    respond(auth(state, &body, false).await)
}

pub async fn handle_backup_auth(state: &AppState, body: Bytes) -> Response<Full<Bytes>> {
    respond(auth(state, &body, true).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::did::{Credential, DidToolkit};
    use crate::identity::IdentityContext;
    use crate::nonce::NonceStore;
    use crate::routes::body_json;
    use crate::testing::{
        holder, issue, respond as sign_response, user, user_credential, Node, T0,
    };
    use serde_json::json;

    const NODE: &str = "did:example:abc";
    const APP: &str = "did:example:app1";

    fn body(value: Value) -> Bytes {
        Bytes::from(value.to_string())
    }

    async fn sign_in_over_http(
        node: &Node,
        state: &AppState,
        app_did: &str,
        seed: u8,
    ) -> (IdentityContext, String) {
        let app = holder(app_did, seed);
        let response = handle_sign_in(state, body(json!({ "id": app.document() }))).await;
        assert_eq!(response.status(), StatusCode::OK);
        let challenge = body_json(response).await["challenge"]
            .as_str()
            .unwrap()
            .to_string();
        let nonce = node
            .toolkit
            .parse_token(&challenge)
            .await
            .unwrap()
            .nonce()
            .unwrap()
            .to_string();
        (app, nonce)
    }

    #[tokio::test]
    async fn test_sign_in_then_auth_over_http_handlers() {
        let node = Node::new(NODE);
        let state = node.app_state();
        let (app, nonce) = sign_in_over_http(&node, &state, APP, 41).await;

        let credential = issue(
            user_credential(APP)
                .with_claim("appDid", "did:example:appdid")
                .with_expiration(T0 + 3600),
        );
        let answer = sign_response(&app, NODE, &nonce, &[credential], T0 + 180);

        let response = handle_auth(&state, body(json!({ "challenge_response": answer }))).await;
        assert_eq!(response.status(), StatusCode::OK);
        let token = body_json(response).await["token"].as_str().unwrap().to_string();
        let grant = node.tokens().verify_access_token(&token).await.unwrap();
        assert_eq!(grant.app_instance_did, APP);
        assert_eq!(grant.props.user_did, user().did());
    }

    #[tokio::test]
    async fn test_auth_refuses_token_for_unproven_user() {
        let node = Node::new(NODE);
        let state = node.app_state();
        let attacker_app = "did:example:attacker-app";
        let (app, nonce) = sign_in_over_http(&node, &state, attacker_app, 42).await;

        let claimed = Credential::new(user().did(), attacker_app)
            .with_claim("appDid", "did:example:appdid")
            .with_expiration(T0 + 3600);
        let answer = sign_response(&app, NODE, &nonce, &[claimed], T0 + 180);

        let response = handle_auth(&state, body(json!({ "challenge_response": answer }))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(node.nonces.access_token(attacker_app).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sign_in_bad_bodies() {
        let node = Node::new(NODE);
        let state = node.app_state();

        for raw in ["", "{", "{}", r#"{"id": {"id": "not-a-did"}}"#] {
            let response = handle_sign_in(&state, Bytes::from(raw)).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{:?}", raw);
            assert_eq!(body_json(response).await["code"], "BAD_REQUEST");
        }
    }

    #[tokio::test]
    async fn test_auth_rejects_unknown_response() {
        let node = Node::new(NODE);
        let state = node.app_state();

        let response = handle_auth(&state, body(json!({ "challenge_response": "a.b.c" }))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = handle_backup_auth(&state, body(json!({ "token": "a.b.c" }))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

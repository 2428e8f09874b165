//! Node DID document endpoint
//!
//! Serves this node's document at /.well-known/did.json so peers can resolve
//! a did:web identity and discover the vault service endpoint.

use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Response, StatusCode};

use super::json_response;
use crate::server::AppState;

pub fn handle_did_document(state: &AppState) -> Response<Full<Bytes>> {
    let mut response = json_response(StatusCode::OK, state.identity.document());
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/did+json"));
    response
}

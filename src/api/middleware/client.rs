//! Client identity and per-request context extraction

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{HeaderMap, header, request::Parts},
};
use sha2::{Digest, Sha256};

use crate::api::state::AppState;
use crate::api::types::ApiError;
use crate::domain::RequestContext;

const REQUEST_ID_HEADER: &str = "x-request-id";
const BEARER_PREFIX_LEN: usize = "Bearer ".len();

/// Extractor producing the `RequestContext` every gateway call takes
///
/// The context carries the request id set by the request-id layer, the
/// rate-limit client key, a cancellation token tied to server shutdown and the
/// configured request deadline.
#[derive(Debug, Clone)]
pub struct ClientContext(pub RequestContext);

impl FromRequestParts<AppState> for ClientContext {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);

        let request_id = parts
            .headers
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let mut ctx = RequestContext::new(request_id, client_key(&parts.headers, peer))
            .with_cancellation(state.shutdown.child_token());

        if let Some(timeout) = state.request_timeout {
            ctx = ctx.with_timeout(timeout);
        }

        Ok(ClientContext(ctx))
    }
}

/// Derive the rate-limit key: API key header, then bearer token, then IP
///
/// Credentials are fingerprinted so raw keys never reach logs or error
/// messages.
pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    if let Some(key) = header_str(headers, "x-api-key").filter(|k| !k.is_empty()) {
        return format!("api_key:{}", fingerprint(key));
    }

    if let Some(token) = header_str(headers, header::AUTHORIZATION.as_str())
        .filter(|v| v.len() > BEARER_PREFIX_LEN)
        .filter(|v| v[..BEARER_PREFIX_LEN].eq_ignore_ascii_case("bearer "))
        .map(|v| v[BEARER_PREFIX_LEN..].trim())
        .filter(|t| !t.is_empty())
    {
        return format!("bearer:{}", fingerprint(token));
    }

    format!("ip:{}", client_ip(headers, peer))
}

fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    if let Some(forwarded) = header_str(headers, "x-forwarded-for") {
        if let Some(first) = forwarded.split(',').map(str::trim).find(|s| !s.is_empty()) {
            return first.to_string();
        }
    }

    if let Some(real_ip) = header_str(headers, "x-real-ip").filter(|v| !v.is_empty()) {
        return real_ip.to_string();
    }

    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
}

/// SHA-256 of the credential, hex encoded
fn fingerprint(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

//! Request extractors for authentication and client metadata.

use super::shared_types::ApiError;
use crate::app_state::AppState;
use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use axum::http::{header, HeaderMap};
use std::net::SocketAddr;
use uuid::Uuid;

/// Identity proven by a valid access token.
///
/// Use as a handler parameter to require `Authorization: Bearer <token>`.
/// Any failure is a generic 401; the cause is only logged.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub username: String,
}

impl AuthenticatedUser {
    /// Verifies an access token and returns the identity it carries.
    pub fn from_access_token(state: &AppState, token: &str) -> Result<Self, ApiError> {
        // ---
        let claims = state.tokens().verify_access(token).map_err(|e| {
            tracing::warn!("Access token rejected: {}", e);
            ApiError::Unauthorized
        })?;

        let user_id = claims.user_id().map_err(|e| {
            tracing::warn!("Access token rejected: {}", e);
            ApiError::Unauthorized
        })?;

        Ok(Self {
            user_id,
            username: claims.username,
        })
    }
}

impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        // ---
        let token = bearer_token(&parts.headers).ok_or_else(|| {
            tracing::warn!("Missing or malformed Authorization header");
            ApiError::Unauthorized
        })?;

        Self::from_access_token(state, token)
    }
}

/// Token from `Authorization: Bearer <token>`, if present and non-empty.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    // ---
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Informational client metadata recorded with each session.
#[derive(Debug, Clone)]
pub struct ClientContext {
    pub user_agent: String,
    pub ip: String,
}

impl FromRequestParts<AppState> for ClientContext {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        // ---
        let user_agent = parts
            .headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("Unknown")
            .to_string();

        let ip = client_ip(
            &parts.headers,
            parts.extensions.get::<ConnectInfo<SocketAddr>>(),
            state.trust_proxy_headers(),
        );

        Ok(Self { user_agent, ip })
    }
}

/// Client address. With `trust_proxy` set: `X-Forwarded-For` (first hop),
/// then `X-Real-IP`, then the socket peer address. Without it only the
/// socket peer counts, since clients control both headers.
fn client_ip(
    headers: &HeaderMap,
    connect_info: Option<&ConnectInfo<SocketAddr>>,
    trust_proxy: bool,
) -> String {
    // ---
    let peer = connect_info.map(|ConnectInfo(addr)| addr.ip().to_string());
    if !trust_proxy {
        return peer.unwrap_or_else(|| "unknown".to_string());
    }

    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    let real_ip = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    forwarded
        .or(real_ip)
        .map(str::to_string)
        .or(peer)
        .unwrap_or_else(|| "unknown".to_string())
}

//! Message history and the realtime WebSocket endpoint.

use super::extractors::{bearer_token, AuthenticatedUser};
use super::shared_types::{ApiError, ApiResponse};
use crate::app_state::AppState;
use crate::relay::ChatFrame;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::Response;
use serde::Deserialize;

/// Handler for `GET /api/protected/history/{username}`.
///
/// Returns every message exchanged between the caller and `username`,
/// oldest first, in the same shape the relay delivers them.
#[tracing::instrument(skip(state, user), fields(username = %user.username))]
pub async fn history(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(peer): Path<String>,
) -> Result<ApiResponse<Vec<ChatFrame>>, ApiError> {
    // ---
    let messages = state
        .repository()
        .list_messages(&user.username, &peer)
        .await?;

    tracing::debug!("{} messages between '{}' and '{}'", messages.len(), user.username, peer);

    Ok(ApiResponse::ok(
        "Chat history retrieved",
        messages.iter().map(ChatFrame::from).collect(),
    ))
}

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    token: Option<String>,
}

/// Handler for `GET /api/ws/chat`.
///
/// Browsers cannot set headers on a WebSocket handshake, so the access token
/// may come from the `token` query parameter; otherwise the usual bearer
/// header is used. The identity is fixed for the lifetime of the socket.
#[tracing::instrument(skip_all)]
pub async fn chat_socket(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    // ---
    let token = query
        .token
        .as_deref()
        .filter(|token| !token.is_empty())
        .or_else(|| bearer_token(&headers))
        .ok_or_else(|| {
            tracing::warn!("WebSocket upgrade without an access token");
            ApiError::Unauthorized
        })?;

    let user = AuthenticatedUser::from_access_token(&state, token)?;
    let relay = state.relay();

    Ok(ws.on_upgrade(move |socket| relay.run_connection(socket, user.username)))
}

//! Protected identity, public-key directory and friend list handlers.

use super::extractors::AuthenticatedUser;
use super::shared_types::{ApiError, ApiJson, ApiResponse};
use crate::app_state::AppState;
use crate::domain::{FriendSummary, PublicKey, StoreError};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct ProfileData {
    profile: String,
}

#[derive(Debug, Serialize)]
pub struct PublicKeyData {
    username: String,
    #[serde(rename = "publicKeyHex")]
    public_key_hex: PublicKey,
}

impl From<FriendSummary> for PublicKeyData {
    fn from(friend: FriendSummary) -> Self {
        Self {
            username: friend.username,
            public_key_hex: friend.public_key,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AddFriendRequest {
    friend_username: String,
}

#[derive(Debug, Serialize)]
pub struct FriendshipData {
    username: String,
    friend_username: String,
}

/// Handler for `GET /api/protected/me` and `GET /api/protected/profile`.
///
/// A valid token for an account that no longer exists is a 401.
#[tracing::instrument(skip(state, user), fields(username = %user.username))]
pub async fn me(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<ApiResponse<ProfileData>, ApiError> {
    // ---
    let found = state
        .repository()
        .get_user_by_id(user.user_id)
        .await?
        .ok_or_else(|| {
            tracing::warn!("Access token names unknown user {}", user.user_id);
            ApiError::Unauthorized
        })?;

    Ok(ApiResponse::ok(
        "Profile retrieved",
        ProfileData {
            profile: found.username,
        },
    ))
}

/// Handler for `GET /api/protected/users/{username}/public-key`.
///
/// Clients need a peer's key to encrypt to it and to check its message
/// signatures. Unknown usernames are a plain 404.
#[tracing::instrument(skip(state, user), fields(requester = %user.username))]
pub async fn public_key(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(username): Path<String>,
) -> Result<ApiResponse<PublicKeyData>, ApiError> {
    // ---
    let found = state
        .repository()
        .get_user_by_username(&username)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(ApiResponse::ok(
        "Public key retrieved",
        PublicKeyData {
            username: found.username,
            public_key_hex: found.public_key,
        },
    ))
}

/// Handler for `GET /api/protected/friends`.
#[tracing::instrument(skip(state, user), fields(username = %user.username))]
pub async fn list_friends(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<ApiResponse<Vec<PublicKeyData>>, ApiError> {
    // ---
    let friends = state.repository().list_friends(&user.username).await?;

    Ok(ApiResponse::ok(
        "Friends retrieved",
        friends.into_iter().map(PublicKeyData::from).collect(),
    ))
}

/// Handler for `POST /api/protected/friends`.
///
/// - `201 Created` once the friendship exists in both directions.
/// - `400 Bad Request` when befriending yourself.
/// - `404 Not Found` for an unknown username.
/// - `409 Conflict` if already friends.
#[tracing::instrument(skip(state, user, payload), fields(username = %user.username))]
pub async fn add_friend(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiJson(payload): ApiJson<AddFriendRequest>,
) -> Result<(StatusCode, ApiResponse<FriendshipData>), ApiError> {
    // ---
    if payload.friend_username == user.username {
        return Err(ApiError::BadRequest(
            "Cannot add yourself as a friend".to_string(),
        ));
    }

    let friendship = state
        .repository()
        .add_friend(&user.username, &payload.friend_username)
        .await
        .map_err(|e| match e {
            StoreError::NotFound(_) => ApiError::NotFound("User not found".to_string()),
            StoreError::Conflict(_) => ApiError::Conflict("Already friends".to_string()),
            StoreError::Backend(e) => ApiError::from(e),
        })?;

    tracing::info!(
        "'{}' and '{}' are now friends",
        friendship.username,
        friendship.friend_username
    );

    Ok((
        StatusCode::CREATED,
        ApiResponse::ok(
            "Friend added",
            FriendshipData {
                username: friendship.username,
                friend_username: friendship.friend_username,
            },
        ),
    ))
}

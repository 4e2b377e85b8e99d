//! Registration, challenge-response login, token refresh and logout.

use super::extractors::{AuthenticatedUser, ClientContext};
use super::shared_types::{ApiError, ApiJson, ApiResponse};
use crate::app_state::AppState;
use crate::auth::{parse_public_key, verify_challenge_signature};
use crate::config::CookieConfig;
use crate::domain::{AuthError, PublicKey, SessionError, Signature, StoreError, TokenError};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Name of the cookie carrying the refresh token.
pub const REFRESH_COOKIE: &str = "refresh_token";

const USERNAME_MIN_LEN: usize = 3;
const USERNAME_MAX_LEN: usize = 32;

// ---

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    username: String,
    #[serde(rename = "publicKeyHex")]
    public_key_hex: PublicKey,
}

#[derive(Debug, Serialize)]
pub struct RegisterData {
    id: String,
    username: String,
    #[serde(rename = "publicKeyHex")]
    public_key_hex: PublicKey,
}

#[derive(Debug, Deserialize)]
pub struct NonceQuery {
    #[serde(default)]
    username: String,
}

#[derive(Debug, Serialize)]
pub struct NonceData {
    nonce: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    username: String,
    signature: Signature,
}

#[derive(Debug, Serialize)]
pub struct TokenData {
    access_token: String,
    username: String,
}

// ---

/// `[A-Za-z0-9_.-]{3,32}`
fn is_valid_username(username: &str) -> bool {
    // ---
    (USERNAME_MIN_LEN..=USERNAME_MAX_LEN).contains(&username.len())
        && username
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b'-'))
}

/// Builds the refresh cookie with the configured security attributes.
fn refresh_cookie(config: &CookieConfig, token: String, max_age: Duration) -> Cookie<'static> {
    // ---
    let mut builder = Cookie::build((REFRESH_COOKIE, token))
        .http_only(true)
        .path("/")
        .max_age(time::Duration::seconds(max_age.as_secs() as i64));

    builder = if config.secure {
        builder.secure(true).same_site(SameSite::None)
    } else {
        builder.same_site(SameSite::Lax)
    };

    if let Some(domain) = &config.domain {
        builder = builder.domain(domain.clone());
    }

    builder.build()
}

/// Cookie that tells the browser to drop the refresh token.
fn removal_cookie(config: &CookieConfig) -> Cookie<'static> {
    // ---
    let mut cookie = refresh_cookie(config, String::new(), Duration::ZERO);
    cookie.make_removal();
    cookie
}

/// Collapses session failures into the response the client gets.
///
/// Rejections are a generic 401; only infrastructure failures are a 500.
fn session_failure(context: &str, e: SessionError) -> ApiError {
    // ---
    match e {
        SessionError::Store(_)
        | SessionError::Hashing(_)
        | SessionError::Token(TokenError::Signing(_)) => {
            tracing::error!("{}: {}", context, e);
            ApiError::Internal
        }
        _ => {
            tracing::warn!("{}: {}", context, e);
            ApiError::Unauthorized
        }
    }
}

// ---

/// Handler for `POST /api/register`.
///
/// Registers a username together with its P-256 public key.
///
/// - `201 Created` with the stored identity.
/// - `400 Bad Request` if the username is not `[A-Za-z0-9_.-]{3,32}` or the
///   key is not a point on P-256.
/// - `409 Conflict` if the username is taken.
#[tracing::instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, ApiResponse<RegisterData>), ApiError> {
    // ---
    if !is_valid_username(&payload.username) {
        return Err(ApiError::BadRequest(
            "Username must be 3-32 characters of letters, digits, '_', '.' or '-'".to_string(),
        ));
    }

    if let Err(e) = parse_public_key(&payload.public_key_hex) {
        tracing::warn!("Registration of '{}' rejected: {}", payload.username, e);
        return Err(ApiError::BadRequest("Invalid public key".to_string()));
    }

    let user = state
        .repository()
        .create_user(&payload.username, &payload.public_key_hex)
        .await
        .map_err(|e| match e {
            StoreError::Conflict(_) => ApiError::Conflict("Username already registered".to_string()),
            other => {
                tracing::error!("Failed to register '{}': {}", payload.username, other);
                ApiError::Internal
            }
        })?;

    tracing::info!("Registered user: {}", user.username);

    Ok((
        StatusCode::CREATED,
        ApiResponse::ok(
            "User registered successfully",
            RegisterData {
                id: user.id.to_string(),
                username: user.username,
                public_key_hex: user.public_key,
            },
        ),
    ))
}

/// Handler for `GET /api/nonce?username=`.
///
/// Issues a fresh single-use challenge for a registered username. Unknown
/// usernames get the same 401 as every other login failure.
#[tracing::instrument(skip(state))]
pub async fn nonce(
    State(state): State<AppState>,
    Query(query): Query<NonceQuery>,
) -> Result<ApiResponse<NonceData>, ApiError> {
    // ---
    let user = state
        .repository()
        .get_user_by_username(&query.username)
        .await?;

    if user.is_none() {
        tracing::warn!("Challenge requested for unknown user '{}'", query.username);
        return Err(ApiError::Unauthorized);
    }

    let nonce = state.challenges().issue(&query.username);

    Ok(ApiResponse::ok("Challenge generated", NonceData { nonce }))
}

/// Handler for `POST /api/login`.
///
/// Consumes the user's outstanding challenge and checks the signature over
/// it. On success a session is created, the refresh token is set as an
/// `HttpOnly` cookie and the access token is returned in the body.
#[tracing::instrument(skip(state, client, jar, payload))]
pub async fn login(
    State(state): State<AppState>,
    client: ClientContext,
    jar: CookieJar,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> Result<(CookieJar, ApiResponse<TokenData>), ApiError> {
    // ---
    let rejected = |reason: &dyn std::fmt::Display| {
        tracing::warn!("Login for '{}' rejected: {}", payload.username, reason);
        state.metrics().record_login(false);
        ApiError::Unauthorized
    };

    let user = match state
        .repository()
        .get_user_by_username(&payload.username)
        .await?
    {
        Some(user) => user,
        None => return Err(rejected(&"unknown user")),
    };

    let challenge = state
        .challenges()
        .consume(&payload.username)
        .map_err(|e| rejected(&e))?;

    match verify_challenge_signature(&user.public_key, &challenge, &payload.signature) {
        Ok(true) => {}
        Ok(false) => return Err(rejected(&AuthError::SignatureInvalid)),
        Err(e) => return Err(rejected(&e)),
    }

    let issued = state
        .sessions()
        .create(user.id, &user.username, &client.user_agent, &client.ip)
        .await
        .map_err(|e| session_failure("Login failed", e))?;

    state.metrics().record_login(true);
    tracing::info!("User '{}' logged in", user.username);

    let cookie = refresh_cookie(
        state.cookie(),
        issued.refresh_token,
        state.tokens().refresh_ttl(),
    );

    Ok((
        jar.add(cookie),
        ApiResponse::ok(
            "Login successful",
            TokenData {
                access_token: issued.access_token,
                username: user.username,
            },
        ),
    ))
}

/// Handler for `GET /api/refresh`.
///
/// Exchanges the refresh cookie for a new access token. With rotation
/// enabled the presented session is replaced and a new cookie is set.
#[tracing::instrument(skip(state, client, jar))]
pub async fn refresh(
    State(state): State<AppState>,
    client: ClientContext,
    jar: CookieJar,
) -> Result<(CookieJar, ApiResponse<TokenData>), ApiError> {
    // ---
    let Some(refresh_token) = jar.get(REFRESH_COOKIE).map(|c| c.value().to_string()) else {
        tracing::warn!("Refresh without a refresh token cookie");
        return Err(ApiError::Unauthorized);
    };

    let (claims, session) = state
        .sessions()
        .verify_and_load(&refresh_token)
        .await
        .map_err(|e| session_failure("Refresh rejected", e))?;

    if state.sessions().rotates_refresh_tokens() {
        let issued = state
            .sessions()
            .rotate(&claims, &session, &client.user_agent, &client.ip)
            .await
            .map_err(|e| session_failure("Refresh rotation failed", e))?;

        let cookie = refresh_cookie(
            state.cookie(),
            issued.refresh_token,
            state.tokens().refresh_ttl(),
        );

        return Ok((
            jar.add(cookie),
            ApiResponse::ok(
                "Access token refreshed successfully",
                TokenData {
                    access_token: issued.access_token,
                    username: claims.username,
                },
            ),
        ));
    }

    let access_token = state
        .sessions()
        .mint_access_for(&claims, &session)
        .map_err(|e| session_failure("Refresh failed", e))?;

    Ok((
        jar,
        ApiResponse::ok(
            "Access token refreshed successfully",
            TokenData {
                access_token,
                username: claims.username,
            },
        ),
    ))
}

/// Handler for `POST /api/protected/logout`.
///
/// Requires both the access token and the refresh cookie; revokes the
/// session the cookie names and clears the cookie.
#[tracing::instrument(skip(state, user, jar), fields(username = %user.username))]
pub async fn logout(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    jar: CookieJar,
) -> Result<(CookieJar, ApiResponse<()>), ApiError> {
    // ---
    let Some(refresh_token) = jar.get(REFRESH_COOKIE).map(|c| c.value().to_string()) else {
        tracing::warn!("Logout without a refresh token cookie");
        return Err(ApiError::Unauthorized);
    };

    let (_, session) = state
        .sessions()
        .verify_and_load(&refresh_token)
        .await
        .map_err(|e| session_failure("Logout rejected", e))?;

    if session.user_id != user.user_id {
        tracing::warn!(
            "Logout rejected: session {} does not belong to '{}'",
            session.session_id,
            user.username
        );
        return Err(ApiError::Unauthorized);
    }

    state
        .sessions()
        .revoke(&session)
        .await
        .map_err(|e| session_failure("Logout failed", e))?;

    Ok((
        jar.add(removal_cookie(state.cookie())),
        ApiResponse::ok("Logout success", ()),
    ))
}

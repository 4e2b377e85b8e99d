//! Access and refresh token minting and verification.
//!
//! The two token classes use different secrets and different algorithms
//! (HS256 for access, HS512 for refresh), and verification pins the
//! algorithm per class. A token of one class can therefore never pass as
//! the other, even if the secrets were to leak into the wrong place.

use crate::domain::{TokenError, TokenInvalidReason};
use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Lifetime of an access token.
pub const ACCESS_TOKEN_TTL: Duration = Duration::from_secs(5 * 60);

const ACCESS_ALGORITHM: Algorithm = Algorithm::HS256;
const REFRESH_ALGORITHM: Algorithm = Algorithm::HS512;

/// Claims carried by a short-lived access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    // ---
    /// User id.
    pub sub: String,
    pub username: String,
    pub iat: i64,
    pub exp: i64,
}

impl AccessClaims {
    // ---
    pub fn user_id(&self) -> Result<Uuid, TokenError> {
        // ---
        Uuid::parse_str(&self.sub).map_err(|_| TokenError::Invalid(TokenInvalidReason::Malformed))
    }
}

/// Claims carried by a refresh token. Only valid together with the session
/// record named by `sid`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshClaims {
    // ---
    pub username: String,
    pub sid: String,
    pub iat: i64,
    pub exp: i64,
}

pub struct TokenCodec {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    refresh_ttl: Duration,
}

impl TokenCodec {
    // ---
    pub fn new(access_secret: &str, refresh_secret: &str, refresh_ttl: Duration) -> Self {
        // ---
        TokenCodec {
            access_encoding: EncodingKey::from_secret(access_secret.as_bytes()),
            access_decoding: DecodingKey::from_secret(access_secret.as_bytes()),
            refresh_encoding: EncodingKey::from_secret(refresh_secret.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(refresh_secret.as_bytes()),
            refresh_ttl,
        }
    }

    pub fn refresh_ttl(&self) -> Duration {
        // ---
        self.refresh_ttl
    }

    pub fn mint_access(&self, user_id: Uuid, username: &str) -> Result<String, TokenError> {
        // ---
        self.mint_access_at(user_id, username, Utc::now().timestamp())
    }

    pub(crate) fn mint_access_at(
        &self,
        user_id: Uuid,
        username: &str,
        issued_at: i64,
    ) -> Result<String, TokenError> {
        // ---
        let claims = AccessClaims {
            sub: user_id.to_string(),
            username: username.to_string(),
            iat: issued_at,
            exp: issued_at + ACCESS_TOKEN_TTL.as_secs() as i64,
        };
        sign(ACCESS_ALGORITHM, &claims, &self.access_encoding)
    }

    pub fn mint_refresh(&self, session_id: &str, username: &str) -> Result<String, TokenError> {
        // ---
        self.mint_refresh_at(session_id, username, Utc::now().timestamp())
    }

    pub(crate) fn mint_refresh_at(
        &self,
        session_id: &str,
        username: &str,
        issued_at: i64,
    ) -> Result<String, TokenError> {
        // ---
        let claims = RefreshClaims {
            username: username.to_string(),
            sid: session_id.to_string(),
            iat: issued_at,
            exp: issued_at + self.refresh_ttl.as_secs() as i64,
        };
        sign(REFRESH_ALGORITHM, &claims, &self.refresh_encoding)
    }

    pub fn verify_access(&self, token: &str) -> Result<AccessClaims, TokenError> {
        // ---
        verify(token, ACCESS_ALGORITHM, &self.access_decoding)
    }

    pub fn verify_refresh(&self, token: &str) -> Result<RefreshClaims, TokenError> {
        // ---
        verify(token, REFRESH_ALGORITHM, &self.refresh_decoding)
    }
}

fn sign<T: Serialize>(algorithm: Algorithm, claims: &T, key: &EncodingKey) -> Result<String, TokenError> {
    // ---
    encode(&Header::new(algorithm), claims, key).map_err(|e| TokenError::Signing(e.to_string()))
}

fn verify<T: DeserializeOwned>(
    token: &str,
    algorithm: Algorithm,
    key: &DecodingKey,
) -> Result<T, TokenError> {
    // ---
    let mut validation = Validation::new(algorithm);
    validation.leeway = 0;

    decode::<T>(token, key, &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            let reason = match e.kind() {
                ErrorKind::ExpiredSignature => TokenInvalidReason::Expired,
                ErrorKind::InvalidSignature => TokenInvalidReason::Forged,
                ErrorKind::InvalidAlgorithm => TokenInvalidReason::WrongAlgorithm,
                _ => TokenInvalidReason::Malformed,
            };
            TokenError::Invalid(reason)
        })
}

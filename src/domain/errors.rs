//! Error taxonomy for the authentication and relay core.
//!
//! None of these are shown to clients verbatim. The HTTP layer collapses
//! every auth and session failure into one generic 401 and logs the
//! specific variant instead.

use std::fmt;
use thiserror::Error;

/// Challenge-response login failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    // ---
    #[error("no outstanding challenge for this identity")]
    NoChallenge,

    #[error("challenge expired before it was answered")]
    ChallengeExpired,

    #[error("signature does not verify against the registered public key")]
    SignatureInvalid,

    #[error("malformed input: {0}")]
    MalformedInput(String),
}

/// Why a token was rejected. Logged, never returned to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenInvalidReason {
    // ---
    Expired,
    Forged,
    WrongAlgorithm,
    Malformed,
}

impl fmt::Display for TokenInvalidReason {
    // ---
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // ---
        let reason = match self {
            TokenInvalidReason::Expired => "expired",
            TokenInvalidReason::Forged => "bad signature",
            TokenInvalidReason::WrongAlgorithm => "unexpected algorithm",
            TokenInvalidReason::Malformed => "malformed",
        };
        f.write_str(reason)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    // ---
    #[error("token invalid ({0})")]
    Invalid(TokenInvalidReason),

    #[error("failed to sign token: {0}")]
    Signing(String),
}

#[derive(Debug, Error)]
pub enum SessionError {
    // ---
    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("session not found")]
    SessionNotFound,

    #[error("session expired")]
    SessionExpired,

    #[error("refresh token does not match the session record")]
    TokenMismatch,

    #[error("refresh token hashing failed: {0}")]
    Hashing(String),

    #[error("session store failure: {0}")]
    Store(#[from] anyhow::Error),
}

/// Per-frame relay failures. None of these close the connection.
#[derive(Debug, Error)]
pub enum RelayError {
    // ---
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    #[error("frame claims sender '{claimed}' but connection belongs to '{actual}'")]
    SenderMismatch { claimed: String, actual: String },

    #[error("'{0}' is not connected")]
    PeerOffline(String),

    #[error("failed to persist message: {0}")]
    PersistFailed(anyhow::Error),
}

/// Storage failures that callers need to tell apart.
#[derive(Debug, Error)]
pub enum StoreError {
    // ---
    #[error("already exists: {0}")]
    Conflict(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

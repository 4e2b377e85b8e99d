//! Challenge-response login and token handling.

mod challenge;
mod signature;
mod tokens;

pub use challenge::{NonceChallengeStore, CHALLENGE_TTL};
pub use signature::{challenge_digest, parse_public_key, verify_challenge_signature};
pub use tokens::{AccessClaims, RefreshClaims, TokenCodec, ACCESS_TOKEN_TTL};

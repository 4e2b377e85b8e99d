//! ECDSA P-256 verification of answered login challenges.
//!
//! Clients sign `SHA3-256(hex_decode(challenge))`: the digest covers the raw
//! challenge bytes, not the hex text the server handed out. Both sides must
//! agree on this exactly or every login fails.

use crate::domain::{AuthError, PublicKey, Signature};
use p256::ecdsa::signature::hazmat::PrehashVerifier;
use p256::ecdsa::{Signature as EcdsaSignature, VerifyingKey};
use p256::{EncodedPoint, FieldBytes};
use sha3::{Digest, Sha3_256};

/// Hex digits in a 256-bit field element.
const FIELD_HEX_LEN: usize = 64;

/// Verifies `signature` over `challenge` against `public_key`.
///
/// Returns `Ok(true)` only for a valid signature and `Ok(false)` when the
/// signature is well-formed but wrong. Inputs that do not decode (bad hex,
/// oversized integers, a point that is not on the curve, zero scalars) yield
/// `AuthError::MalformedInput`; callers must treat that as a failed check.
pub fn verify_challenge_signature(
    public_key: &PublicKey,
    challenge: &str,
    signature: &Signature,
) -> Result<bool, AuthError> {
    // ---
    let r = decode_field_hex("signature r", &signature.r)?;
    let s = decode_field_hex("signature s", &signature.s)?;
    let verifying_key = parse_public_key(public_key)?;

    let message = hex::decode(challenge)
        .map_err(|e| AuthError::MalformedInput(format!("challenge is not hex: {e}")))?;
    let digest = challenge_digest(&message);

    let signature = EcdsaSignature::from_scalars(r, s)
        .map_err(|_| AuthError::MalformedInput("signature scalars out of range".to_string()))?;

    Ok(verifying_key.verify_prehash(&digest, &signature).is_ok())
}

/// Rebuilds a P-256 verifying key from hex affine coordinates.
///
/// Registration uses this to refuse keys that could never verify anything.
pub fn parse_public_key(public_key: &PublicKey) -> Result<VerifyingKey, AuthError> {
    // ---
    let x = decode_field_hex("public key x", &public_key.x)?;
    let y = decode_field_hex("public key y", &public_key.y)?;

    let point = EncodedPoint::from_affine_coordinates(&x, &y, false);
    VerifyingKey::from_encoded_point(&point)
        .map_err(|_| AuthError::MalformedInput("public key is not a point on P-256".to_string()))
}

/// SHA3-256 of the decoded challenge bytes.
pub fn challenge_digest(message: &[u8]) -> [u8; 32] {
    // ---
    let mut hasher = Sha3_256::new();
    hasher.update(message);
    hasher.finalize().into()
}

/// Parses a hex big integer (optional `0x`, leading zeros optional) into a
/// 32-byte big-endian field element.
fn decode_field_hex(field: &str, value: &str) -> Result<FieldBytes, AuthError> {
    // ---
    let trimmed = value.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(AuthError::MalformedInput(format!(
            "{field} is not a hex integer"
        )));
    }

    let significant = digits.trim_start_matches('0');
    if significant.len() > FIELD_HEX_LEN {
        return Err(AuthError::MalformedInput(format!(
            "{field} exceeds 256 bits"
        )));
    }

    let padded = format!("{significant:0>width$}", width = FIELD_HEX_LEN);
    let mut bytes = [0u8; FIELD_HEX_LEN / 2];
    hex::decode_to_slice(padded, &mut bytes)
        .map_err(|e| AuthError::MalformedInput(format!("{field}: {e}")))?;

    Ok(FieldBytes::from(bytes))
}

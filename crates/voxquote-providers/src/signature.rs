// SPDX-FileCopyrightText: 2026 Voxquote Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Webhook authentication primitives shared by every adapter.
//!
//! HMAC digests are SHA-256 over the raw request body, hex-encoded, with an
//! optional `sha256=` prefix. All comparisons are constant-time.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Why a webhook signature or secret was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("missing {0} header")]
    MissingHeader(String),

    #[error("signature is not valid hex")]
    Malformed,

    #[error("signature does not match")]
    Mismatch,

    #[error("secret does not match")]
    SecretMismatch,
}

/// Strip an optional `sha256=` prefix (any case) and decode the hex digest.
pub fn decode_signature(header: &str) -> Result<Vec<u8>, SignatureError> {
    let header = header.trim();
    let digest = match header.get(..7) {
        Some(prefix) if prefix.eq_ignore_ascii_case("sha256=") => &header[7..],
        _ => header,
    };
    if digest.is_empty() {
        return Err(SignatureError::Malformed);
    }
    hex::decode(digest).map_err(|_| SignatureError::Malformed)
}

/// Verify `header` as the HMAC-SHA256 of `body` under `secret`.
pub fn verify_hmac_sha256(secret: &str, body: &[u8], header: &str) -> Result<(), SignatureError> {
    let expected = decode_signature(header)?;
    // HMAC accepts keys of any length, so construction cannot fail.
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return Err(SignatureError::Mismatch);
    };
    mac.update(body);
    mac.verify_slice(&expected)
        .map_err(|_| SignatureError::Mismatch)
}

/// Compare a presented secret or token with the configured one.
pub fn verify_shared_secret(expected: &str, presented: &str) -> Result<(), SignatureError> {
    if bool::from(expected.as_bytes().ct_eq(presented.as_bytes())) {
        Ok(())
    } else {
        Err(SignatureError::SecretMismatch)
    }
}

/// Extract the token from an `Authorization: Bearer <token>` value.
pub fn bearer_token(authorization: &str) -> Option<&str> {
    let (scheme, token) = authorization.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

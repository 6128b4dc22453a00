//! Text encodings for key material and content digests.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sha2::{Digest, Sha256};

use crate::error::CryptoError;

/// Encode bytes as standard (padded) base64.
#[must_use]
pub fn b64_encode(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Decode standard base64, ignoring surrounding whitespace.
///
/// `context` names the decoded item in the error message.
pub fn b64_decode(text: &str, context: &str) -> Result<Vec<u8>, CryptoError> {
    STANDARD
        .decode(text.trim())
        .map_err(|e| CryptoError::invalid_encoding(context, e.to_string()))
}

/// Lowercase hex SHA-256 digest of a byte slice.
#[must_use]
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Compare two hex digests in constant time, ignoring case.
///
/// Returns `false` if either side is not valid hex.
#[must_use]
pub fn sha256_hex_eq(a: &str, b: &str) -> bool {
    match (hex::decode(a.trim()), hex::decode(b.trim())) {
        (Ok(a), Ok(b)) => crate::constant_time_eq(&a, &b),
        _ => false,
    }
}

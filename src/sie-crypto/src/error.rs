//! Error type for key, signature and encoding problems.

use thiserror::Error;

/// Malformed key material.
///
/// A well-formed signature that simply does not match is not an error here;
/// [`crate::ClassicalVerifier::verify`] reports it as `Ok(false)`.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Signature bytes have the wrong length or shape.
    #[error("Malformed signature: {reason}")]
    InvalidSignature {
        /// What is wrong with the signature.
        reason: String,
    },

    /// Public key bytes have the wrong length or are not a curve point.
    #[error("Malformed public key: {reason}")]
    InvalidPublicKey {
        /// What is wrong with the key.
        reason: String,
    },

    /// Seed has the wrong length.
    #[error("Malformed seed: {reason}")]
    InvalidPrivateKey {
        /// What is wrong with the seed.
        reason: String,
    },

    /// Base64 text could not be decoded.
    #[error("Invalid base64 ({context}): {reason}")]
    InvalidEncoding {
        /// What was being decoded.
        context: String,
        /// Decoder message.
        reason: String,
    },
}

impl CryptoError {
    /// Malformed signature.
    #[must_use]
    pub fn invalid_signature(reason: impl Into<String>) -> Self {
        Self::InvalidSignature {
            reason: reason.into(),
        }
    }

    /// Malformed public key.
    #[must_use]
    pub fn invalid_public_key(reason: impl Into<String>) -> Self {
        Self::InvalidPublicKey {
            reason: reason.into(),
        }
    }

    /// Malformed seed.
    #[must_use]
    pub fn invalid_private_key(reason: impl Into<String>) -> Self {
        Self::InvalidPrivateKey {
            reason: reason.into(),
        }
    }

    /// Base64 decode failure for `context`.
    #[must_use]
    pub fn invalid_encoding(context: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidEncoding {
            context: context.into(),
            reason: reason.into(),
        }
    }
}

//! Signer and verifier traits.
//!
//! Envelope and registry code is written against these traits rather than a
//! concrete curve, so tests can swap in fixed-seed signers.

use crate::error::CryptoError;
use crate::types::ClassicalAlgorithm;

/// Trait for classical signature operations.
pub trait ClassicalSigner {
    /// Get the algorithm used by this signer.
    fn algorithm(&self) -> ClassicalAlgorithm;

    /// Get the public key.
    fn public_key(&self) -> Result<Vec<u8>, CryptoError>;

    /// Sign data and return the signature.
    fn sign(&self, data: &[u8]) -> Result<Vec<u8>, CryptoError>;
}

/// Trait for classical signature verification.
pub trait ClassicalVerifier {
    /// Verify a signature against a public key.
    ///
    /// Returns `Ok(false)` for a well-formed signature that does not match,
    /// and an error when the key or signature has the wrong shape.
    fn verify(&self, public_key: &[u8], data: &[u8], signature: &[u8])
        -> Result<bool, CryptoError>;
}

//! # sie-crypto
//!
//! Signature primitives for signed instruction envelopes (SIE).
//!
//! Envelopes, registry snapshots and their root keys are all handled with a
//! single classical scheme:
//!
//! - **Ed25519**: 32-byte public keys, 64-byte deterministic signatures
//!
//! Keys and signatures travel as standard base64 text; content bindings use
//! lowercase hex SHA-256 digests.
//!
//! ## Verification Contract
//!
//! A signature that simply does not match yields `Ok(false)`. Keys or
//! signatures of the wrong shape are a distinct error, so callers can tell
//! "forged" apart from "garbled":
//!
//! ```rust,ignore
//! let verifier = Ed25519Verifier::new();
//! match verifier.verify(&public_key, data, &signature) {
//!     Ok(true) => { /* authentic */ }
//!     Ok(false) => { /* signature mismatch */ }
//!     Err(e) => { /* malformed key material */ }
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod ed25519;
mod encoding;
mod error;
mod signer;
mod types;

pub use ed25519::{Ed25519Signer, Ed25519Verifier};
pub use encoding::{b64_decode, b64_encode, sha256_hex, sha256_hex_eq};
pub use error::CryptoError;
pub use signer::{ClassicalSigner, ClassicalVerifier};
pub use types::{
    ClassicalAlgorithm, ED25519_PUBLIC_KEY_LEN, ED25519_SEED_LEN, ED25519_SIGNATURE_LEN,
};

/// Constant-time byte comparison.
///
/// Compares two byte slices in constant time to prevent timing attacks.
/// Returns `true` if the slices are equal, `false` otherwise.
///
/// # Security
///
/// Use this for every comparison of keys, signatures and digests.
/// The length check still returns early; lengths here are public.
#[must_use]
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    use subtle::ConstantTimeEq;

    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

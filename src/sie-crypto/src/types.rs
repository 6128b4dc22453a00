//! Algorithm identifiers and key material sizes.

use serde::{Deserialize, Serialize};

/// Length of an Ed25519 public key in bytes.
pub const ED25519_PUBLIC_KEY_LEN: usize = 32;

/// Length of an Ed25519 signature in bytes.
pub const ED25519_SIGNATURE_LEN: usize = 64;

/// Length of an Ed25519 private key seed in bytes.
pub const ED25519_SEED_LEN: usize = 32;

/// Classical signature algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum ClassicalAlgorithm {
    /// Ed25519 Edwards curve
    /// Used for issuer envelopes and registry snapshots
    Ed25519 = 2,
}

impl ClassicalAlgorithm {
    /// OID for this algorithm (for X.509/PKCS)
    #[must_use]
    pub const fn oid(&self) -> &'static str {
        match self {
            Self::Ed25519 => "1.3.101.112", // id-Ed25519
        }
    }

    /// Public key size in bytes.
    #[must_use]
    pub const fn public_key_size(&self) -> usize {
        match self {
            Self::Ed25519 => ED25519_PUBLIC_KEY_LEN,
        }
    }

    /// Signature size in bytes.
    #[must_use]
    pub const fn signature_size(&self) -> usize {
        match self {
            Self::Ed25519 => ED25519_SIGNATURE_LEN,
        }
    }
}

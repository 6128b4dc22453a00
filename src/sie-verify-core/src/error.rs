//! Error types for envelope verification and enforcement.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during verification.
///
/// Every variant is fail-closed: a caller that receives any of these must
/// treat the envelope's content as untrusted data.
#[derive(Debug, Error)]
pub enum VerifyError {
    /// Neither `issuer` nor `payload.issuer` is set.
    #[error("Envelope missing issuer")]
    MissingIssuer,

    /// Issuer has no record in the verified registry snapshot.
    #[error("Issuer '{issuer}' not present in registry snapshot")]
    IssuerNotRegistered {
        /// Issuer id.
        issuer: String,
    },

    /// Issuer has no key in the local keyring.
    #[error("Issuer '{issuer}' is not trusted (missing from local keyring)")]
    IssuerNotTrustedLocally {
        /// Issuer id.
        issuer: String,
    },

    /// The issuer's key appears in a registry revocation record.
    #[error("Issuer '{issuer}' key revoked in registry")]
    KeyRevoked {
        /// Issuer id.
        issuer: String,
    },

    /// Envelope signature does not match its canonical payload.
    #[error("Envelope signature verification failed")]
    SignatureInvalid,

    /// Key or signature bytes have the wrong shape or encoding.
    #[error("Malformed key material: {reason}")]
    MalformedKeyMaterial {
        /// Reason for the failure.
        reason: String,
    },

    /// External file digest differs from the signed `payload.sha256`.
    #[error("External file hash does not match signed payload.sha256 (file was modified): {path:?}")]
    HashMismatch {
        /// File that was checked.
        path: PathBuf,
    },

    /// A check file was supplied but the envelope carries no `payload.sha256`.
    #[error("Envelope has no payload.sha256 to compare against")]
    HashBindingMissing,

    /// Check file could not be read.
    #[error("Check file unreadable: {path:?}: {reason}")]
    CheckFileUnreadable {
        /// File that was checked.
        path: PathBuf,
        /// Reason for the failure.
        reason: String,
    },

    /// Envelope is not declared as an instruction-channel envelope.
    #[error("Envelope channel {actual:?} is not the instruction channel")]
    ChannelMismatch {
        /// Channel found in the envelope, if any.
        actual: Option<String>,
    },

    /// Registry snapshot signature (or root key) failed verification.
    #[error("Registry signature invalid: {reason}")]
    RegistrySignatureInvalid {
        /// Reason for the failure.
        reason: String,
    },

    /// Registry artifacts missing (after a refresh attempt in remote mode).
    #[error("Registry files missing in {dir:?}")]
    RegistryFilesMissing {
        /// Directory that was searched.
        dir: PathBuf,
    },

    /// Signed registry bytes are not a valid snapshot document.
    #[error("Registry snapshot malformed: {reason}")]
    RegistryMalformed {
        /// Reason for the failure.
        reason: String,
    },

    /// Remote registry fetch failed or timed out.
    #[error("Registry unreachable: {message}")]
    RegistryUnreachable {
        /// Error message.
        message: String,
    },

    /// Fetched registry artifacts could not be written to the cache.
    #[error("Registry cache write failed: {message}")]
    RegistryCacheWrite {
        /// Error message.
        message: String,
    },

    /// Keyring file does not exist.
    #[error("Trusted issuer keyring not found: {path:?}")]
    KeyringNotFound {
        /// Keyring path.
        path: PathBuf,
    },

    /// Keyring file is not a JSON object of string to string.
    #[error("Trusted issuer keyring must be a JSON object {{issuer: pubkey_b64}}: {reason}")]
    KeyringMalformed {
        /// Reason for the failure.
        reason: String,
    },

    /// Envelope file is missing, unreadable, or not a valid envelope.
    #[error("Malformed envelope: {reason}")]
    MalformedEnvelope {
        /// Reason for the failure.
        reason: String,
    },

    /// Skill file does not exist.
    #[error("Skill file not found: {path:?}")]
    SkillNotFound {
        /// Skill path.
        path: PathBuf,
    },

    /// Enforcement mode is not `warn` or `strict`.
    #[error("mode must be 'warn' or 'strict', got '{value}'")]
    ConfigInvalidMode {
        /// Rejected value.
        value: String,
    },

    /// Host configuration could not be read or parsed.
    #[error("Configuration error: {message}")]
    ConfigInvalid {
        /// Error message.
        message: String,
    },
}

impl VerifyError {
    /// Stable machine-readable code for this error.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingIssuer => "missing_issuer",
            Self::IssuerNotRegistered { .. } => "issuer_not_registered",
            Self::IssuerNotTrustedLocally { .. } => "issuer_not_trusted_locally",
            Self::KeyRevoked { .. } => "key_revoked",
            Self::SignatureInvalid => "signature_invalid",
            Self::MalformedKeyMaterial { .. } => "malformed_key_material",
            Self::HashMismatch { .. } => "hash_mismatch",
            Self::HashBindingMissing => "hash_binding_missing",
            Self::CheckFileUnreadable { .. } => "check_file_unreadable",
            Self::ChannelMismatch { .. } => "channel_mismatch",
            Self::RegistrySignatureInvalid { .. } => "registry_signature_invalid",
            Self::RegistryFilesMissing { .. } => "registry_files_missing",
            Self::RegistryMalformed { .. } => "registry_malformed",
            Self::RegistryUnreachable { .. } => "registry_unreachable",
            Self::RegistryCacheWrite { .. } => "registry_cache_write",
            Self::KeyringNotFound { .. } => "keyring_not_found",
            Self::KeyringMalformed { .. } => "keyring_malformed",
            Self::MalformedEnvelope { .. } => "malformed_envelope",
            Self::SkillNotFound { .. } => "skill_not_found",
            Self::ConfigInvalidMode { .. } => "config_invalid_mode",
            Self::ConfigInvalid { .. } => "config_invalid",
        }
    }

    /// Check if this error came from the trust registry layer.
    #[must_use]
    pub fn is_registry_failure(&self) -> bool {
        matches!(
            self,
            Self::RegistrySignatureInvalid { .. }
                | Self::RegistryFilesMissing { .. }
                | Self::RegistryMalformed { .. }
                | Self::RegistryUnreachable { .. }
                | Self::RegistryCacheWrite { .. }
        )
    }

    /// Check if this error is a configuration problem rather than a
    /// verdict about an envelope.
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::ConfigInvalidMode { .. } | Self::ConfigInvalid { .. }
        )
    }
}

impl From<sie_crypto::CryptoError> for VerifyError {
    fn from(e: sie_crypto::CryptoError) -> Self {
        Self::MalformedKeyMaterial {
            reason: e.to_string(),
        }
    }
}

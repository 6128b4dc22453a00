//! Envelope verification pipeline.
//!
//! Composes the channel guard, local keyring, trust registry and codec into
//! a single verify-or-fail operation:
//!
//! ```text
//! channel → issuer → registry presence → keyring → revocation → signature → tamper binding
//! ```
//!
//! The first failing stage decides the error. Only a fully verified envelope
//! yields a [`LoadedInstruction`]; anything else must be treated as data.

use std::path::Path;

use serde_json::{Map, Value};
use sie_crypto::{sha256_hex, sha256_hex_eq};
use tracing::{info, instrument, warn};

use crate::channel::ChannelGuard;
use crate::codec;
use crate::envelope::Envelope;
use crate::error::VerifyError;
use crate::keyring::TrustedIssuerStore;
use crate::registry::RegistryClient;

/// Instruction content released by a successful verification.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedInstruction {
    /// Resolved issuer id.
    pub issuer: String,
    /// Envelope id.
    pub envelope_id: String,
    /// Issuer constraints.
    pub constraints: Map<String, Value>,
    /// Issuer scope.
    pub scope: Vec<String>,
    /// Verified instruction text.
    pub content: String,
}

/// Verifies envelopes against a local keyring and the trust registry.
pub struct EnvelopeVerifier {
    registry: RegistryClient,
}

impl EnvelopeVerifier {
    /// Create a verifier backed by the given registry client.
    pub fn new(registry: RegistryClient) -> Self {
        Self { registry }
    }

    /// Registry client used for presence and revocation checks.
    pub fn registry(&self) -> &RegistryClient {
        &self.registry
    }

    /// Verify an envelope using the issuer key from a keyring file.
    ///
    /// The keyring is read fresh on every call. When `check_file` is given,
    /// its SHA-256 must equal the signed `payload.sha256`.
    #[instrument(skip(self, envelope, check_file), fields(envelope_id = %envelope.id))]
    pub fn verify(
        &self,
        envelope: &Envelope,
        keyring_path: &Path,
        check_file: Option<&Path>,
    ) -> Result<LoadedInstruction, VerifyError> {
        self.run(envelope, KeySource::Keyring(keyring_path), check_file)
    }

    /// Verify an envelope against an explicitly supplied base64 public key
    /// instead of a keyring lookup.
    ///
    /// Registry presence and revocation still apply.
    #[instrument(skip(self, envelope, public_key_b64, check_file), fields(envelope_id = %envelope.id))]
    pub fn verify_with_key(
        &self,
        envelope: &Envelope,
        public_key_b64: &str,
        check_file: Option<&Path>,
    ) -> Result<LoadedInstruction, VerifyError> {
        self.run(envelope, KeySource::Explicit(public_key_b64), check_file)
    }

    fn run(
        &self,
        envelope: &Envelope,
        key_source: KeySource<'_>,
        check_file: Option<&Path>,
    ) -> Result<LoadedInstruction, VerifyError> {
        ChannelGuard::require_instruction_channel(envelope)?;
        let issuer = envelope.resolve_issuer()?;

        let snapshot = self.registry.load_verified_snapshot()?;
        if !snapshot.is_issuer_present(issuer) {
            warn!(issuer = %issuer, "Issuer not present in registry");
            return Err(VerifyError::IssuerNotRegistered {
                issuer: issuer.to_string(),
            });
        }

        let keyring;
        let public_key = match key_source {
            KeySource::Keyring(path) => {
                keyring = TrustedIssuerStore::load(path)?;
                keyring.lookup(issuer)?
            },
            KeySource::Explicit(key) => key,
        };

        if snapshot.is_key_revoked(issuer, public_key) {
            warn!(issuer = %issuer, "Issuer key revoked");
            return Err(VerifyError::KeyRevoked {
                issuer: issuer.to_string(),
            });
        }

        codec::verify(envelope, public_key)?;

        if let Some(path) = check_file {
            check_binding(envelope, path)?;
        }

        info!(issuer = %issuer, "Envelope verified");
        Ok(LoadedInstruction {
            issuer: issuer.to_string(),
            envelope_id: envelope.id.clone(),
            constraints: envelope.constraints.clone(),
            scope: envelope.scope.clone(),
            content: envelope.payload.content.clone(),
        })
    }
}

enum KeySource<'a> {
    Keyring(&'a Path),
    Explicit(&'a str),
}

/// Compare the digest of an external file with the signed `payload.sha256`.
fn check_binding(envelope: &Envelope, path: &Path) -> Result<(), VerifyError> {
    let bytes = std::fs::read(path).map_err(|e| VerifyError::CheckFileUnreadable {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let expected = envelope
        .payload
        .sha256
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or(VerifyError::HashBindingMissing)?;

    if sha256_hex_eq(&sha256_hex(&bytes), expected) {
        Ok(())
    } else {
        warn!(path = ?path, "Check file digest differs from signed binding");
        Err(VerifyError::HashMismatch {
            path: path.to_path_buf(),
        })
    }
}

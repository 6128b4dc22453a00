//! Local trusted-issuer keyring.
//!
//! The keyring is a JSON object mapping issuer ids to base64 Ed25519 public
//! keys. It is re-read from disk on every verification, so edits take effect
//! immediately.

use std::collections::HashMap;
use std::path::Path;

use tracing::debug;

use crate::error::VerifyError;

/// Default keyring file name.
pub const DEFAULT_KEYRING_FILE: &str = "trusted_issuers.json";

/// Issuer id to public key mapping loaded from a keyring file.
#[derive(Debug, Clone, Default)]
pub struct TrustedIssuerStore {
    keys: HashMap<String, String>,
}

impl TrustedIssuerStore {
    /// Load a keyring file.
    ///
    /// Fails with `KeyringNotFound` if the file does not exist and
    /// `KeyringMalformed` if it is not a JSON object of strings.
    pub fn load(path: &Path) -> Result<Self, VerifyError> {
        if !path.exists() {
            return Err(VerifyError::KeyringNotFound {
                path: path.to_path_buf(),
            });
        }

        let text = std::fs::read_to_string(path).map_err(|e| VerifyError::KeyringMalformed {
            reason: format!("cannot read {:?}: {}", path, e),
        })?;
        let store = Self::from_json(&text)?;

        debug!(path = ?path, issuers = store.len(), "Loaded trusted issuer keyring");
        Ok(store)
    }

    /// Parse keyring JSON text.
    pub fn from_json(text: &str) -> Result<Self, VerifyError> {
        let keys: HashMap<String, String> =
            serde_json::from_str(text).map_err(|e| VerifyError::KeyringMalformed {
                reason: e.to_string(),
            })?;
        Ok(Self { keys })
    }

    /// Look up the base64 public key for an issuer.
    pub fn lookup(&self, issuer_id: &str) -> Result<&str, VerifyError> {
        self.keys
            .get(issuer_id)
            .map(String::as_str)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| VerifyError::IssuerNotTrustedLocally {
                issuer: issuer_id.to_string(),
            })
    }

    /// Number of issuers in the keyring.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the keyring holds no issuers.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

//! Trust registry client.
//!
//! The registry is a signed snapshot of issuer and revocation records,
//! anchored to a root Ed25519 key. It is published as three artifacts:
//!
//! ```text
//! {base_url}/registry/registry.json                  raw signed bytes
//! {base_url}/registry/registry.sig                   base64 signature
//! {base_url}/registry/registry_root_public_key.b64   base64 root key
//! ```
//!
//! Snapshot document:
//!
//! ```json
//! {
//!   "records": [
//!     {"type": "issuer", "issuer_id": "acme", "public_key": "base64..."},
//!     {"type": "revocation", "issuer_id": "acme", "revoked_key": "base64..."}
//!   ]
//! }
//! ```
//!
//! ## Security Properties
//!
//! - **Verify on every read**: the signature is checked each time the
//!   snapshot is loaded, whether it came from the cache or a local directory
//! - **No partial cache**: all three artifacts are fully read before any is
//!   written, and each is replaced atomically
//! - **Objective answers only**: presence and revocation, never policy
//! - **Bounded staleness**: a cache older than `max_cache_age` is refreshed;
//!   if that refresh fails the load fails

use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::Deserialize;
use sie_crypto::{b64_decode, constant_time_eq, ClassicalVerifier, Ed25519Verifier};
use tracing::{debug, info, instrument, warn};

use crate::config::RegistryConfig;
use crate::error::VerifyError;

/// Snapshot document file name.
pub const REGISTRY_FILE: &str = "registry.json";

/// Detached snapshot signature file name.
pub const SIGNATURE_FILE: &str = "registry.sig";

/// Root public key file name.
pub const ROOT_KEY_FILE: &str = "registry_root_public_key.b64";

/// Upper bound on a single fetched artifact.
const MAX_ARTIFACT_BYTES: u64 = 16 * 1024 * 1024;

/// A single registry record.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Record {
    /// Issuer known to the registry.
    Issuer {
        /// Issuer id.
        issuer_id: String,
        /// Base64 public key.
        public_key: String,
    },
    /// A revoked issuer key.
    Revocation {
        /// Issuer id.
        issuer_id: String,
        /// Base64 key that must no longer be trusted.
        revoked_key: String,
    },
    /// Record type this client does not understand; ignored.
    #[serde(other)]
    Unknown,
}

#[derive(Deserialize)]
struct SnapshotDocument {
    #[serde(default)]
    records: Vec<serde_json::Value>,
}

/// A registry snapshot whose signature has been verified.
///
/// The only constructor verifies the signature first, so an unverified
/// snapshot cannot be queried.
#[derive(Debug, Clone)]
pub struct RegistrySnapshot {
    records: Vec<Record>,
}

impl RegistrySnapshot {
    /// Verify raw snapshot bytes against a detached signature and root key,
    /// then parse them.
    ///
    /// When `pinned_root_key` is given, `root_key_b64` must decode to the
    /// same key.
    pub fn from_signed_bytes(
        bytes: &[u8],
        signature_b64: &str,
        root_key_b64: &str,
        pinned_root_key: Option<&str>,
    ) -> Result<Self, VerifyError> {
        let root_key = b64_decode(root_key_b64, "registry root key").map_err(signature_invalid)?;

        if let Some(pinned) = pinned_root_key {
            let pinned =
                b64_decode(pinned, "pinned registry root key").map_err(signature_invalid)?;
            if !constant_time_eq(&pinned, &root_key) {
                warn!("Registry root key does not match pinned key");
                return Err(VerifyError::RegistrySignatureInvalid {
                    reason: "root key does not match pinned root key".into(),
                });
            }
        }

        let signature =
            b64_decode(signature_b64, "registry signature").map_err(signature_invalid)?;

        match Ed25519Verifier::new().verify(&root_key, bytes, &signature) {
            Ok(true) => {},
            Ok(false) => {
                warn!("Registry snapshot signature mismatch");
                return Err(VerifyError::RegistrySignatureInvalid {
                    reason: "signature does not match snapshot".into(),
                });
            },
            Err(e) => return Err(signature_invalid(e)),
        }

        let doc: SnapshotDocument =
            serde_json::from_slice(bytes).map_err(|e| VerifyError::RegistryMalformed {
                reason: e.to_string(),
            })?;

        // A record that does not fit its schema answers nothing, like an
        // unknown record type; it must not void the rest of the snapshot.
        let records = doc
            .records
            .into_iter()
            .filter_map(|raw| match serde_json::from_value::<Record>(raw) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!("Skipping malformed registry record: {}", e);
                    None
                },
            })
            .collect();

        Ok(Self { records })
    }

    /// All records in snapshot order.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Registry public key for an issuer, if the issuer is present.
    pub fn issuer_public_key(&self, issuer_id: &str) -> Option<&str> {
        self.records.iter().find_map(|r| match r {
            Record::Issuer {
                issuer_id: id,
                public_key,
            } if id == issuer_id => Some(public_key.as_str()),
            _ => None,
        })
    }

    /// True iff an issuer record with this id exists.
    pub fn is_issuer_present(&self, issuer_id: &str) -> bool {
        self.issuer_public_key(issuer_id).is_some()
    }

    /// True iff a revocation record matches this issuer and key.
    pub fn is_key_revoked(&self, issuer_id: &str, public_key_b64: &str) -> bool {
        self.records.iter().any(|r| match r {
            Record::Revocation {
                issuer_id: id,
                revoked_key,
            } => id == issuer_id && keys_match(revoked_key, public_key_b64),
            _ => false,
        })
    }
}

/// Compare two base64 keys by their decoded bytes, falling back to the
/// trimmed text when either side does not decode.
fn keys_match(a: &str, b: &str) -> bool {
    match (b64_decode(a, "key"), b64_decode(b, "key")) {
        (Ok(a), Ok(b)) => constant_time_eq(&a, &b),
        _ => a.trim() == b.trim(),
    }
}

fn signature_invalid(e: sie_crypto::CryptoError) -> VerifyError {
    VerifyError::RegistrySignatureInvalid {
        reason: e.to_string(),
    }
}

/// Registry client for loading verified snapshots.
pub struct RegistryClient {
    /// Registry settings.
    config: RegistryConfig,
    /// Base URL without trailing slash.
    base_url: Option<String>,
    /// Blocking HTTP agent.
    agent: ureq::Agent,
}

impl RegistryClient {
    /// Create a new registry client.
    pub fn new(config: RegistryConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(config.timeout)
            .timeout(config.timeout)
            .user_agent(&format!("sie-verify/{}", env!("CARGO_PKG_VERSION")))
            .build();

        let base_url = config
            .base_url
            .as_deref()
            .map(|u| u.trim_end_matches('/').to_string());

        Self {
            config,
            base_url,
            agent,
        }
    }

    /// Registry settings.
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Whether snapshots come from a remote base URL.
    pub fn is_remote(&self) -> bool {
        self.base_url.is_some()
    }

    /// Directory the snapshot is read from: the cache in remote mode,
    /// otherwise the local registry directory.
    pub fn files_dir(&self) -> &Path {
        if self.is_remote() {
            &self.config.cache_dir
        } else {
            &self.config.registry_dir
        }
    }

    /// Fetch all three artifacts and write them into the cache directory.
    ///
    /// No-op in offline mode. Nothing is written unless every fetch
    /// succeeded, so a failed or timed-out fetch leaves the cache as it was.
    #[instrument(skip(self), fields(base_url = ?self.base_url))]
    pub fn refresh_cache(&self) -> Result<(), VerifyError> {
        let Some(base_url) = self.base_url.as_deref() else {
            return Ok(());
        };

        let registry = self.fetch(base_url, REGISTRY_FILE)?;
        let signature = fetch_text(self.fetch(base_url, SIGNATURE_FILE)?, SIGNATURE_FILE)?;
        let root_key = fetch_text(self.fetch(base_url, ROOT_KEY_FILE)?, ROOT_KEY_FILE)?;

        let dir = &self.config.cache_dir;
        std::fs::create_dir_all(dir).map_err(|e| VerifyError::RegistryCacheWrite {
            message: format!("cannot create {:?}: {}", dir, e),
        })?;

        write_atomic(&dir.join(REGISTRY_FILE), &registry)?;
        write_atomic(&dir.join(SIGNATURE_FILE), signature.trim().as_bytes())?;
        write_atomic(&dir.join(ROOT_KEY_FILE), root_key.trim().as_bytes())?;

        info!(
            cache_dir = ?dir,
            snapshot_bytes = registry.len(),
            "Registry cache refreshed"
        );
        Ok(())
    }

    /// Load the snapshot and verify its signature.
    ///
    /// In remote mode a missing or stale cache triggers exactly one
    /// [`refresh_cache`](Self::refresh_cache).
    #[instrument(skip(self))]
    pub fn load_verified_snapshot(&self) -> Result<RegistrySnapshot, VerifyError> {
        let dir = self.files_dir().to_path_buf();
        let paths = ArtifactPaths::new(&dir);

        if self.is_remote() {
            if !paths.all_exist() {
                info!(cache_dir = ?dir, "Registry cache missing, fetching");
                self.refresh_cache()?;
            } else if self.is_stale(&paths.registry) {
                info!(cache_dir = ?dir, "Registry cache stale, fetching");
                self.refresh_cache()?;
            }
        }

        if !paths.all_exist() {
            return Err(VerifyError::RegistryFilesMissing { dir });
        }

        let bytes = read_artifact(&paths.registry)?;
        let signature = String::from_utf8_lossy(&read_artifact(&paths.signature)?).into_owned();
        let root_key = String::from_utf8_lossy(&read_artifact(&paths.root_key)?).into_owned();

        let snapshot = RegistrySnapshot::from_signed_bytes(
            &bytes,
            &signature,
            &root_key,
            self.config.pinned_root_key.as_deref(),
        )?;

        debug!(
            dir = ?dir,
            records = snapshot.records().len(),
            "Loaded verified registry snapshot"
        );
        Ok(snapshot)
    }

    /// Load a verified snapshot and check issuer presence.
    pub fn is_issuer_present(&self, issuer_id: &str) -> Result<bool, VerifyError> {
        Ok(self.load_verified_snapshot()?.is_issuer_present(issuer_id))
    }

    /// Load a verified snapshot and check key revocation.
    pub fn is_key_revoked(&self, issuer_id: &str, public_key_b64: &str) -> Result<bool, VerifyError> {
        Ok(self
            .load_verified_snapshot()?
            .is_key_revoked(issuer_id, public_key_b64))
    }

    fn is_stale(&self, registry_path: &Path) -> bool {
        let Some(max_age) = self.config.max_cache_age else {
            return false;
        };

        let modified = match std::fs::metadata(registry_path).and_then(|m| m.modified()) {
            Ok(t) => t,
            Err(_) => return true,
        };

        // A timestamp in the future counts as fresh.
        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or_default();
        age >= max_age
    }

    fn fetch(&self, base_url: &str, name: &str) -> Result<Vec<u8>, VerifyError> {
        let url = format!("{}/registry/{}", base_url, name);
        debug!("Fetching {}", url);

        let response = self.agent.get(&url).call().map_err(|e| {
            warn!("Registry fetch failed: {} - {}", url, e);
            match e {
                ureq::Error::Status(code, _) => VerifyError::RegistryUnreachable {
                    message: format!("{}: HTTP status {}", url, code),
                },
                ureq::Error::Transport(t) => VerifyError::RegistryUnreachable {
                    message: format!("{}: {}", url, t),
                },
            }
        })?;

        read_limited(response.into_reader(), MAX_ARTIFACT_BYTES, &url)
    }
}

/// Read a response body, failing instead of truncating when it exceeds
/// `limit` bytes.
fn read_limited(reader: impl Read, limit: u64, url: &str) -> Result<Vec<u8>, VerifyError> {
    let mut body = Vec::new();
    reader
        .take(limit.saturating_add(1))
        .read_to_end(&mut body)
        .map_err(|e| VerifyError::RegistryUnreachable {
            message: format!("{}: error reading body: {}", url, e),
        })?;

    if body.len() as u64 > limit {
        warn!("Registry artifact too large: {}", url);
        return Err(VerifyError::RegistryUnreachable {
            message: format!("{}: artifact exceeds {} bytes", url, limit),
        });
    }
    Ok(body)
}

fn fetch_text(body: Vec<u8>, name: &str) -> Result<String, VerifyError> {
    String::from_utf8(body).map_err(|e| VerifyError::RegistryUnreachable {
        message: format!("{} is not UTF-8: {}", name, e),
    })
}

struct ArtifactPaths {
    registry: PathBuf,
    signature: PathBuf,
    root_key: PathBuf,
}

impl ArtifactPaths {
    fn new(dir: &Path) -> Self {
        Self {
            registry: dir.join(REGISTRY_FILE),
            signature: dir.join(SIGNATURE_FILE),
            root_key: dir.join(ROOT_KEY_FILE),
        }
    }

    fn all_exist(&self) -> bool {
        self.registry.is_file() && self.signature.is_file() && self.root_key.is_file()
    }
}

fn read_artifact(path: &Path) -> Result<Vec<u8>, VerifyError> {
    std::fs::read(path).map_err(|e| {
        debug!(path = ?path, error = %e, "Registry artifact unreadable");
        VerifyError::RegistryFilesMissing {
            dir: path.parent().map(Path::to_path_buf).unwrap_or_default(),
        }
    })
}

/// Write via a sibling temp file and rename, so readers never observe a
/// half-written artifact.
fn write_atomic(path: &Path, data: &[u8]) -> Result<(), VerifyError> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!("{}.tmp", file_name));

    std::fs::write(&tmp, data)
        .and_then(|()| std::fs::rename(&tmp, path))
        .map_err(|e| VerifyError::RegistryCacheWrite {
            message: format!("{:?}: {}", path, e),
        })
}

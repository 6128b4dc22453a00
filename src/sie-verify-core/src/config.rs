//! Configuration for verification and enforcement.
//!
//! Host loaders configure the subsystem through a nested JSON section,
//! `agents.security.sie`, which is mapped once into a typed [`SieConfig`]:
//!
//! ```json
//! {
//!   "agents": {
//!     "security": {
//!       "sie": {
//!         "enabled": true,
//!         "strict": true,
//!         "trustedIssuers": "keys/trusted_issuers.json",
//!         "envelopeSuffix": ".sie.json",
//!         "registryUrl": "https://example.org/sie",
//!         "registryMaxCacheAgeSecs": 3600
//!       }
//!     }
//!   }
//! }
//! ```
//!
//! Relative paths resolve against the directory of the config file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::enforcement::EnforcementMode;
use crate::envelope::DEFAULT_ENVELOPE_SUFFIX;
use crate::error::VerifyError;
use crate::keyring::DEFAULT_KEYRING_FILE;

/// Default local registry directory (offline mode).
pub const DEFAULT_REGISTRY_DIR: &str = "registry";

/// Default cache directory for remotely fetched registry snapshots.
pub const DEFAULT_CACHE_DIR: &str = ".cache/sie_registry";

/// Default registry fetch timeout.
pub const DEFAULT_REGISTRY_TIMEOUT: Duration = Duration::from_secs(10);

/// Default maximum age of a cached registry snapshot.
pub const DEFAULT_MAX_CACHE_AGE: Duration = Duration::from_secs(24 * 60 * 60);

/// Where and how the trust registry snapshot is obtained.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Local registry directory, used when `base_url` is `None`.
    pub registry_dir: PathBuf,
    /// Remote base URL; artifacts live under `{base_url}/registry/`.
    pub base_url: Option<String>,
    /// Cache directory for remote artifacts.
    pub cache_dir: PathBuf,
    /// Fetch timeout.
    pub timeout: Duration,
    /// Refresh a cached snapshot older than this. `None` never expires.
    pub max_cache_age: Option<Duration>,
    /// Expected registry root key (base64). When set, the root key file
    /// must match it.
    pub pinned_root_key: Option<String>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            registry_dir: PathBuf::from(DEFAULT_REGISTRY_DIR),
            base_url: None,
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            timeout: DEFAULT_REGISTRY_TIMEOUT,
            max_cache_age: Some(DEFAULT_MAX_CACHE_AGE),
            pinned_root_key: None,
        }
    }
}

impl RegistryConfig {
    /// Offline configuration reading artifacts from a local directory.
    pub fn offline(registry_dir: impl Into<PathBuf>) -> Self {
        Self {
            registry_dir: registry_dir.into(),
            ..Self::default()
        }
    }

    /// Remote configuration fetching from `base_url` into `cache_dir`.
    pub fn remote(base_url: impl Into<String>, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_url: Some(base_url.into()),
            cache_dir: cache_dir.into(),
            ..Self::default()
        }
    }
}

/// Typed runtime configuration for the enforcement subsystem.
#[derive(Debug, Clone)]
pub struct SieConfig {
    /// When `false` the subsystem is bypassed and every skill is allowed.
    pub enabled: bool,
    /// Unsigned-skill policy.
    pub mode: EnforcementMode,
    /// Trusted issuer keyring path.
    pub trusted_issuers: PathBuf,
    /// Suffix appended to a skill path to find its envelope.
    pub envelope_suffix: String,
    /// Registry settings.
    pub registry: RegistryConfig,
}

impl Default for SieConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            mode: EnforcementMode::Warn,
            trusted_issuers: PathBuf::from(DEFAULT_KEYRING_FILE),
            envelope_suffix: DEFAULT_ENVELOPE_SUFFIX.to_string(),
            registry: RegistryConfig::default(),
        }
    }
}

/// Raw `agents.security.sie` section as written by host loaders.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct HostSieSection {
    enabled: bool,
    strict: bool,
    verify_script: Option<String>,
    trusted_issuers: Option<PathBuf>,
    envelope_suffix: Option<String>,
    registry_dir: Option<PathBuf>,
    registry_url: Option<String>,
    registry_cache_dir: Option<PathBuf>,
    registry_timeout_secs: Option<u64>,
    registry_max_cache_age_secs: Option<u64>,
    registry_root_key: Option<String>,
}

impl SieConfig {
    /// Map a host-loader config document into a typed config.
    ///
    /// A missing `agents.security.sie` section yields the defaults
    /// (disabled, warn mode). Unless `enabled` is exactly `true`, the rest
    /// of the section is never an error: a disabled host always bypasses.
    pub fn from_host_json(config: &Value, base_dir: &Path) -> Result<Self, VerifyError> {
        let raw = config
            .pointer("/agents/security/sie")
            .filter(|v| !v.is_null());
        let enabled = raw
            .and_then(|v| v.get("enabled"))
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let section: HostSieSection = match raw {
            None => HostSieSection::default(),
            Some(value) => match HostSieSection::deserialize(value) {
                Ok(section) => section,
                Err(e) if !enabled => {
                    debug!("Ignoring malformed agents.security.sie while disabled: {}", e);
                    HostSieSection::default()
                },
                Err(e) => {
                    return Err(VerifyError::ConfigInvalid {
                        message: format!("agents.security.sie: {}", e),
                    })
                },
            },
        };

        if let Some(script) = &section.verify_script {
            debug!(
                verify_script = %script,
                "verifyScript is ignored; envelopes are verified in-process"
            );
        }

        let defaults = RegistryConfig::default();
        let registry = RegistryConfig {
            registry_dir: resolve(
                base_dir,
                section.registry_dir.unwrap_or(defaults.registry_dir),
            ),
            base_url: section.registry_url,
            cache_dir: resolve(
                base_dir,
                section.registry_cache_dir.unwrap_or(defaults.cache_dir),
            ),
            timeout: section
                .registry_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            max_cache_age: section
                .registry_max_cache_age_secs
                .map(Duration::from_secs)
                .or(defaults.max_cache_age),
            pinned_root_key: section.registry_root_key,
        };

        Ok(Self {
            enabled: enabled && section.enabled,
            mode: if section.strict {
                EnforcementMode::Strict
            } else {
                EnforcementMode::Warn
            },
            trusted_issuers: resolve(
                base_dir,
                section
                    .trusted_issuers
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_KEYRING_FILE)),
            ),
            envelope_suffix: section
                .envelope_suffix
                .unwrap_or_else(|| DEFAULT_ENVELOPE_SUFFIX.to_string()),
            registry,
        })
    }

    /// Load a host-loader config file; relative paths resolve against its
    /// parent directory.
    pub fn load(config_path: &Path) -> Result<Self, VerifyError> {
        let text =
            std::fs::read_to_string(config_path).map_err(|e| VerifyError::ConfigInvalid {
                message: format!("cannot read {:?}: {}", config_path, e),
            })?;
        let value: Value = serde_json::from_str(&text).map_err(|e| VerifyError::ConfigInvalid {
            message: format!("{:?}: {}", config_path, e),
        })?;
        let base_dir = config_path.parent().unwrap_or_else(|| Path::new(""));
        Self::from_host_json(&value, base_dir)
    }
}

fn resolve(base_dir: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        base_dir.join(path)
    }
}

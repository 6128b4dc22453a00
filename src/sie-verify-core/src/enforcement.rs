//! Skill admission policy.
//!
//! Decides whether a skill file may be loaded, based on whether it carries a
//! signed envelope and on the configured [`EnforcementMode`]:
//!
//! | mode   | envelope               | outcome | reason            |
//! |--------|------------------------|---------|-------------------|
//! | warn   | absent                 | allow   | `unsigned_warn`   |
//! | strict | absent                 | reject  | `unsigned_strict` |
//! | any    | present, fails         | reject  | `verify_failed`   |
//! | any    | present, verifies      | allow   | `verified`        |
//!
//! A missing skill file is always rejected with `skill_not_found`.

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::config::SieConfig;
use crate::envelope::Envelope;
use crate::error::VerifyError;
use crate::registry::RegistryClient;
use crate::verifier::EnvelopeVerifier;

/// Policy for skills that carry no envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EnforcementMode {
    /// Allow unsigned skills with a warning.
    #[default]
    Warn,
    /// Reject unsigned skills.
    Strict,
}

impl FromStr for EnforcementMode {
    type Err = VerifyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "warn" => Ok(Self::Warn),
            "strict" => Ok(Self::Strict),
            other => Err(VerifyError::ConfigInvalidMode {
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for EnforcementMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warn => write!(f, "warn"),
            Self::Strict => write!(f, "strict"),
        }
    }
}

/// Why a decision was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    /// Envelope present and verified.
    Verified,
    /// No envelope, warn mode.
    UnsignedWarn,
    /// No envelope, strict mode.
    UnsignedStrict,
    /// Envelope present but verification failed.
    VerifyFailed,
    /// Skill file does not exist.
    SkillNotFound,
    /// Enforcement disabled by host configuration.
    SieDisabled,
}

impl DecisionReason {
    /// Snake-case name as used in JSON output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Verified => "verified",
            Self::UnsignedWarn => "unsigned_warn",
            Self::UnsignedStrict => "unsigned_strict",
            Self::VerifyFailed => "verify_failed",
            Self::SkillNotFound => "skill_not_found",
            Self::SieDisabled => "sie_disabled",
        }
    }
}

impl fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of evaluating a skill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnforcementDecision {
    /// Whether the skill may be loaded.
    pub allowed: bool,
    /// Machine-readable reason.
    pub reason: DecisionReason,
    /// Human-readable detail.
    pub detail: String,
}

impl EnforcementDecision {
    fn allow(reason: DecisionReason, detail: impl Into<String>) -> Self {
        Self {
            allowed: true,
            reason,
            detail: detail.into(),
        }
    }

    fn reject(reason: DecisionReason, detail: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason,
            detail: detail.into(),
        }
    }

    /// Decision for a host that has enforcement switched off.
    pub fn disabled() -> Self {
        Self::allow(DecisionReason::SieDisabled, "SIE disabled; allowing skill")
    }
}

/// Evaluates skills against an enforcement mode.
pub struct EnforcementEngine {
    mode: EnforcementMode,
    trusted_issuers: PathBuf,
    envelope_suffix: String,
    verifier: EnvelopeVerifier,
}

impl EnforcementEngine {
    /// Create an engine.
    pub fn new(
        mode: EnforcementMode,
        trusted_issuers: impl Into<PathBuf>,
        envelope_suffix: impl Into<String>,
        verifier: EnvelopeVerifier,
    ) -> Self {
        Self {
            mode,
            trusted_issuers: trusted_issuers.into(),
            envelope_suffix: envelope_suffix.into(),
            verifier,
        }
    }

    /// Create an engine from a typed config.
    ///
    /// The `enabled` flag is not consulted here; see
    /// [`hook::enforce_skill_with_config`](crate::hook::enforce_skill_with_config).
    pub fn from_config(config: &SieConfig) -> Self {
        Self::new(
            config.mode,
            config.trusted_issuers.clone(),
            config.envelope_suffix.clone(),
            EnvelopeVerifier::new(RegistryClient::new(config.registry.clone())),
        )
    }

    /// Configured mode.
    pub fn mode(&self) -> EnforcementMode {
        self.mode
    }

    /// Envelope path for a skill: the skill path with the suffix appended.
    pub fn envelope_path(&self, skill: &Path) -> PathBuf {
        let mut path = OsString::from(skill.as_os_str());
        path.push(&self.envelope_suffix);
        PathBuf::from(path)
    }

    /// Decide whether `skill` may be loaded.
    #[instrument(skip(self), fields(mode = %self.mode))]
    pub fn evaluate(&self, skill: &Path) -> EnforcementDecision {
        if !skill.exists() {
            warn!(skill = ?skill, "Skill file not found");
            return EnforcementDecision::reject(
                DecisionReason::SkillNotFound,
                format!("skill file not found: {}", skill.display()),
            );
        }

        let envelope_path = self.envelope_path(skill);
        if !envelope_path.exists() {
            return match self.mode {
                EnforcementMode::Strict => {
                    warn!(skill = ?skill, "Unsigned skill rejected");
                    EnforcementDecision::reject(
                        DecisionReason::UnsignedStrict,
                        "unsigned skill rejected (strict mode)",
                    )
                },
                EnforcementMode::Warn => {
                    warn!(skill = ?skill, "Unsigned skill allowed in warn mode");
                    EnforcementDecision::allow(
                        DecisionReason::UnsignedWarn,
                        "unsigned skill allowed (warn mode)",
                    )
                },
            };
        }

        match self.verify_envelope(&envelope_path, skill) {
            Ok(()) => {
                info!(skill = ?skill, "Signed skill verified");
                EnforcementDecision::allow(DecisionReason::Verified, "signed skill verified")
            },
            Err(e) => {
                warn!(skill = ?skill, code = e.code(), "Skill verification failed: {}", e);
                EnforcementDecision::reject(
                    DecisionReason::VerifyFailed,
                    format!("{}: {}", e.code(), e),
                )
            },
        }
    }

    fn verify_envelope(&self, envelope_path: &Path, skill: &Path) -> Result<(), VerifyError> {
        let envelope = Envelope::load(envelope_path)?;
        self.verifier
            .verify(&envelope, &self.trusted_issuers, Some(skill))
            .map(|_| ())
    }
}

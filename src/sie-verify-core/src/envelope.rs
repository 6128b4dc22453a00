//! Signed instruction envelope types.
//!
//! An envelope binds an issuer identity to a piece of instruction content,
//! its policy constraints and its scope. On disk it is a JSON document that
//! conventionally lives next to the skill it covers:
//!
//! ```json
//! {
//!   "issuer": "acme-skills",
//!   "id": "skill-001",
//!   "channel": "instruction",
//!   "payload": {
//!     "name": "SKILL.md",
//!     "content": "# Skill\n...",
//!     "sha256": "hex digest of SKILL.md"
//!   },
//!   "constraints": { "deny_prompt_disclosure": true },
//!   "scope": ["summarize"],
//!   "signature": "base64 Ed25519 signature"
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::VerifyError;

/// Channel value that marks an envelope as carrying instructions.
pub const CHANNEL_INSTRUCTION: &str = "instruction";

/// Default suffix appended to a skill path to locate its envelope.
pub const DEFAULT_ENVELOPE_SUFFIX: &str = ".sie.json";

/// A signed instruction envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Issuer id. Falls back to `payload.issuer` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    /// Envelope identifier.
    #[serde(default)]
    pub id: String,
    /// Declared channel; only [`CHANNEL_INSTRUCTION`] is trusted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    /// Instruction payload.
    pub payload: Payload,
    /// Policy constraints attached by the issuer.
    #[serde(default)]
    pub constraints: Map<String, Value>,
    /// Ordered scope entries.
    #[serde(default)]
    pub scope: Vec<String>,
    /// Base64 signature over the canonical form.
    #[serde(default)]
    pub signature: String,
}

/// Envelope payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    /// Optional display name of the covered file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Instruction text.
    pub content: String,
    /// Lowercase hex SHA-256 of the external file this envelope covers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    /// Alternate location of the issuer id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
}

impl Envelope {
    /// Parse an envelope from JSON text.
    pub fn from_json(text: &str) -> Result<Self, VerifyError> {
        serde_json::from_str(text).map_err(|e| VerifyError::MalformedEnvelope {
            reason: e.to_string(),
        })
    }

    /// Read and parse an envelope file.
    pub fn load(path: &Path) -> Result<Self, VerifyError> {
        let text = std::fs::read_to_string(path).map_err(|e| VerifyError::MalformedEnvelope {
            reason: format!("cannot read {:?}: {}", path, e),
        })?;
        Self::from_json(&text)
    }

    /// Serialize to pretty JSON.
    pub fn to_json_pretty(&self) -> Result<String, VerifyError> {
        serde_json::to_string_pretty(self).map_err(|e| VerifyError::MalformedEnvelope {
            reason: e.to_string(),
        })
    }

    /// Resolve the issuer id: top-level `issuer`, else `payload.issuer`.
    ///
    /// Empty strings count as absent.
    pub fn resolve_issuer(&self) -> Result<&str, VerifyError> {
        self.issuer
            .as_deref()
            .filter(|s| !s.is_empty())
            .or_else(|| self.payload.issuer.as_deref().filter(|s| !s.is_empty()))
            .ok_or(VerifyError::MissingIssuer)
    }
}

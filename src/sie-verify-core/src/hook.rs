//! Entry points for host skill loaders.
//!
//! Hosts call these at skill load time. When enforcement is disabled in the
//! host config every skill is allowed, so existing setups keep working.

use std::path::Path;

use serde_json::Value;
use tracing::debug;

use crate::config::SieConfig;
use crate::enforcement::{EnforcementDecision, EnforcementEngine};
use crate::error::VerifyError;

/// Evaluate a skill using the `agents.security.sie` section of a host config.
///
/// Relative `skill_path` values and config paths resolve against `base_dir`.
/// Only a malformed config section is an error; every verification outcome is
/// reported through the decision.
pub fn enforce_skill(
    skill_path: &Path,
    host_config: &Value,
    base_dir: &Path,
) -> Result<EnforcementDecision, VerifyError> {
    let config = SieConfig::from_host_json(host_config, base_dir)?;
    let skill = if skill_path.is_absolute() {
        skill_path.to_path_buf()
    } else {
        base_dir.join(skill_path)
    };
    Ok(enforce_skill_with_config(&skill, &config))
}

/// Evaluate a skill with an already-typed config.
pub fn enforce_skill_with_config(skill_path: &Path, config: &SieConfig) -> EnforcementDecision {
    if !config.enabled {
        debug!(skill = ?skill_path, "SIE disabled");
        return EnforcementDecision::disabled();
    }
    EnforcementEngine::from_config(config).evaluate(skill_path)
}

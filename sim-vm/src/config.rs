//! Script execution settings

use crate::{VmError, VmResult};
use serde::{Deserialize, Serialize};

/// What a script does when a call reports a broken contract invariant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvariantPolicy {
    /// Stop the script; remaining calls are skipped
    #[default]
    Abort,
    /// Treat it like any other failed call and keep going
    Absorb,
}

/// Script configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptConfig {
    /// Handling of fatal invariant violations
    #[serde(default)]
    pub invariant_policy: InvariantPolicy,
}

impl ScriptConfig {
    /// Config with an explicit invariant policy
    pub fn with_policy(invariant_policy: InvariantPolicy) -> Self {
        Self { invariant_policy }
    }

    /// Load script settings from TOML
    pub fn from_toml(toml_str: &str) -> VmResult<Self> {
        toml::from_str(toml_str)
            .map_err(|e| VmError::Config(format!("Failed to parse script config: {}", e)))
    }

    /// Convert to TOML string
    pub fn to_toml(&self) -> VmResult<String> {
        toml::to_string(self)
            .map_err(|e| VmError::Config(format!("Failed to serialize script config: {}", e)))
    }
}

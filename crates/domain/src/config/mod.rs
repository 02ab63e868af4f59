mod bootstrap;
mod observability;
mod orchestrator;
mod sessions;

pub use bootstrap::*;
pub use observability::*;
pub use orchestrator::*;
pub use sessions::*;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::error::{Error, Result};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    /// First-turn bootstrap. Absent = disabled.
    #[serde(default)]
    pub bootstrap: Option<BootstrapConfig>,
    #[serde(default)]
    pub sessions: SessionsConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load the config from a TOML file. A missing file yields defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml(&raw)
            .map_err(|e| Error::Config(format!("parsing {}: {e}", path.display())))
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| Error::Config(e.to_string()))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.orchestrator.max_tool_rounds == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "orchestrator.max_tool_rounds".into(),
                message: "must be greater than 0".into(),
            });
        }

        if self.orchestrator.invalid_call_threshold == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "orchestrator.invalid_call_threshold".into(),
                message: "must be greater than 0".into(),
            });
        }

        if self.orchestrator.fallback_message.trim().is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "orchestrator.fallback_message".into(),
                message: "fallback message must not be empty".into(),
            });
        }

        if let Some(bootstrap) = &self.bootstrap {
            if bootstrap.intent_calls.is_empty() {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Warning,
                    field: "bootstrap.intent_calls".into(),
                    message: "bootstrap is configured but lists no intents".into(),
                });
            }
            for (i, call) in bootstrap.intent_calls.iter().enumerate() {
                if call.intent_code.trim().is_empty() {
                    errors.push(ConfigError {
                        severity: ConfigSeverity::Error,
                        field: format!("bootstrap.intent_calls[{i}].intent_code"),
                        message: "intent code must not be empty".into(),
                    });
                }
                if !call.params.is_object() {
                    errors.push(ConfigError {
                        severity: ConfigSeverity::Error,
                        field: format!("bootstrap.intent_calls[{i}].params"),
                        message: "params must be a table".into(),
                    });
                }
            }
            let limits = &bootstrap.limits;
            if limits.max_payload_bytes < limits.preview_chars {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Warning,
                    field: "bootstrap.limits.preview_chars".into(),
                    message: "preview is larger than the payload budget".into(),
                });
            }
        }

        if self.sessions.storage == StorageKind::Jsonl && self.sessions.state_path.is_none() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "sessions.state_path".into(),
                message: "jsonl storage requires a state_path".into(),
            });
        }

        errors
    }
}

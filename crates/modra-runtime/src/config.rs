//! Orchestrator configuration
//!
//! A small YAML-backed config that seeds the orchestrator's base context and
//! its runtime knobs. Every field except the registry path has a default, so
//! a minimal file only names where the registry snapshot lives.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use modra_kernel::{AgentKind, ExecutionContext};

/// Configuration loading errors.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Format(#[from] serde_yaml::Error),
}

/// Result alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Module pair used by the latency adaptation rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapPair {
    /// Module to swap out when latency degrades.
    pub slow: String,
    /// Module to swap in.
    pub fast: String,
}

/// Orchestrator construction parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Where the registry snapshot file lives.
    pub registry_path: PathBuf,
    /// Deployment environment stamped into every request context.
    #[serde(default = "default_environment")]
    pub environment: String,
    /// Compliance level stamped into every request context.
    #[serde(default = "default_compliance_level")]
    pub compliance_level: String,
    /// Agent kind the orchestrator selects modules for.
    #[serde(default)]
    pub agent_kind: AgentKind,
    /// Optional slow/fast pair for the latency adaptation rule.
    #[serde(default)]
    pub swap_pair: Option<SwapPair>,
    /// Timeout applied to chain steps that do not configure their own.
    #[serde(default = "default_step_timeout_secs")]
    pub default_step_timeout_secs: u64,
}

fn default_environment() -> String {
    "production".to_string()
}

fn default_compliance_level() -> String {
    "enterprise".to_string()
}

fn default_step_timeout_secs() -> u64 {
    30
}

impl OrchestratorConfig {
    /// Create a config with defaults for everything but the registry path.
    pub fn new(registry_path: impl Into<PathBuf>) -> Self {
        Self {
            registry_path: registry_path.into(),
            environment: default_environment(),
            compliance_level: default_compliance_level(),
            agent_kind: AgentKind::default(),
            swap_pair: None,
            default_step_timeout_secs: default_step_timeout_secs(),
        }
    }

    /// Load a config from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&text)?)
    }

    /// Set the deployment environment.
    pub fn with_environment(mut self, environment: &str) -> Self {
        self.environment = environment.to_string();
        self
    }

    /// Set the compliance level.
    pub fn with_compliance_level(mut self, level: &str) -> Self {
        self.compliance_level = level.to_string();
        self
    }

    /// Set the agent kind.
    pub fn with_agent_kind(mut self, kind: AgentKind) -> Self {
        self.agent_kind = kind;
        self
    }

    /// Set the slow/fast swap pair.
    pub fn with_swap_pair(mut self, slow: &str, fast: &str) -> Self {
        self.swap_pair = Some(SwapPair {
            slow: slow.to_string(),
            fast: fast.to_string(),
        });
        self
    }

    /// Default step timeout as a [`Duration`].
    pub fn default_step_timeout(&self) -> Duration {
        Duration::from_secs(self.default_step_timeout_secs)
    }

    /// Base context every request starts from.
    pub fn base_context(&self) -> ExecutionContext {
        ExecutionContext::new()
            .with("agent_type", self.agent_kind)
            .with("environment", self.environment.as_str())
            .with("compliance_level", self.compliance_level.as_str())
    }
}

//! Capability descriptors
//!
//! A descriptor is the registry's record of one module: identity, the
//! fingerprint of its backing artifact, the selection surface (capability
//! tags, supported kinds/modes/roles), the dependency graph edges, and the
//! performance statistics the registry maintains for it.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{AgentKind, ModuleStatus, OrchestrationMode, UserRole};

/// Performance statistics embedded in a descriptor.
///
/// Mutated only by the registry's performance recording; everyone else reads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceStats {
    /// Effectiveness score in `[0, 1]`, exponential moving average.
    pub effectiveness: f64,
    /// Number of performance observations folded in so far.
    pub usage_count: u64,
    /// Cumulative mean of observed failures in `[0, 1]`.
    pub error_rate: f64,
    /// Cumulative mean latency in milliseconds.
    pub avg_latency_ms: f64,
    /// When the module last received an observation.
    pub last_used: Option<DateTime<Utc>>,
}

/// Metadata record describing one module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleDescriptor {
    /// Stable module id.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Module version string.
    pub version: String,
    /// What the module does.
    #[serde(default)]
    pub description: String,
    /// Path to the backing artifact.
    pub artifact_path: PathBuf,
    /// SHA-256 hex fingerprint of the artifact.
    pub fingerprint: String,
    /// Artifact size in bytes.
    #[serde(default)]
    pub size_bytes: u64,
    /// Rough token-cost estimate for planning.
    #[serde(default)]
    pub token_estimate: u64,
    /// Capability tags the module offers.
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// Agent kinds the module serves.
    #[serde(default)]
    pub supported_kinds: Vec<AgentKind>,
    /// Orchestration modes the module supports.
    #[serde(default)]
    pub supported_modes: Vec<OrchestrationMode>,
    /// Caller roles the module supports.
    #[serde(default)]
    pub supported_roles: Vec<UserRole>,
    /// Ids that must be active alongside this module.
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Ids that must never be co-active with this module.
    #[serde(default)]
    pub conflicts: Vec<String>,
    /// Optional grouping parent.
    #[serde(default)]
    pub parent_module: Option<String>,
    /// Optional grouped children.
    #[serde(default)]
    pub submodules: Vec<String>,
    /// Lifecycle status.
    #[serde(default)]
    pub status: ModuleStatus,
    /// When the descriptor was last audited.
    pub audit_timestamp: DateTime<Utc>,
    /// Who approved the module for use.
    #[serde(default)]
    pub approved_by: Option<String>,
    /// Compliance regimes the module satisfies.
    #[serde(default)]
    pub compliance_tags: Vec<String>,
    /// Registry-owned performance statistics.
    #[serde(default)]
    pub performance: PerformanceStats,
}

impl ModuleDescriptor {
    /// Create a descriptor with empty selection surface and fresh stats.
    pub fn new(id: &str, name: &str, version: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            version: version.to_string(),
            description: String::new(),
            artifact_path: PathBuf::new(),
            fingerprint: String::new(),
            size_bytes: 0,
            token_estimate: 0,
            capabilities: Vec::new(),
            supported_kinds: Vec::new(),
            supported_modes: Vec::new(),
            supported_roles: Vec::new(),
            dependencies: Vec::new(),
            conflicts: Vec::new(),
            parent_module: None,
            submodules: Vec::new(),
            status: ModuleStatus::Available,
            audit_timestamp: Utc::now(),
            approved_by: None,
            compliance_tags: Vec::new(),
            performance: PerformanceStats::default(),
        }
    }

    /// Set description.
    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    /// Set the backing artifact path and its expected fingerprint.
    pub fn with_artifact<P: AsRef<Path>>(mut self, path: P, fingerprint: &str) -> Self {
        self.artifact_path = path.as_ref().to_path_buf();
        self.fingerprint = fingerprint.to_string();
        self
    }

    /// Set artifact size and token estimate.
    pub fn with_size(mut self, size_bytes: u64, token_estimate: u64) -> Self {
        self.size_bytes = size_bytes;
        self.token_estimate = token_estimate;
        self
    }

    /// Add an offered capability tag.
    pub fn with_capability(mut self, capability: &str) -> Self {
        self.capabilities.push(capability.to_string());
        self
    }

    /// Add a supported agent kind.
    pub fn with_kind(mut self, kind: AgentKind) -> Self {
        self.supported_kinds.push(kind);
        self
    }

    /// Add a supported orchestration mode.
    pub fn with_mode(mut self, mode: OrchestrationMode) -> Self {
        self.supported_modes.push(mode);
        self
    }

    /// Add a supported caller role.
    pub fn with_role(mut self, role: UserRole) -> Self {
        self.supported_roles.push(role);
        self
    }

    /// Add a dependency id.
    pub fn with_dependency(mut self, id: &str) -> Self {
        self.dependencies.push(id.to_string());
        self
    }

    /// Add a conflicting id.
    pub fn with_conflict(mut self, id: &str) -> Self {
        self.conflicts.push(id.to_string());
        self
    }

    /// Set lifecycle status.
    pub fn with_status(mut self, status: ModuleStatus) -> Self {
        self.status = status;
        self
    }

    /// Set the grouping parent.
    pub fn with_parent(mut self, parent: &str) -> Self {
        self.parent_module = Some(parent.to_string());
        self
    }

    /// Add a grouped child id.
    pub fn with_submodule(mut self, id: &str) -> Self {
        self.submodules.push(id.to_string());
        self
    }

    /// Set approver.
    pub fn with_approved_by(mut self, approver: &str) -> Self {
        self.approved_by = Some(approver.to_string());
        self
    }

    /// Add a compliance tag.
    pub fn with_compliance_tag(mut self, tag: &str) -> Self {
        self.compliance_tags.push(tag.to_string());
        self
    }

    /// Seed the effectiveness score (e.g., when importing a vetted module).
    pub fn with_effectiveness(mut self, effectiveness: f64) -> Self {
        self.performance.effectiveness = effectiveness;
        self
    }

    /// Whether a failed step of this module must abort its chain.
    pub fn is_critical(&self) -> bool {
        self.status == ModuleStatus::Critical
    }

    /// Whether the module offers a capability tag.
    pub fn offers(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|c| c == capability)
    }

    /// Whether the module serves an agent kind.
    pub fn supports_kind(&self, kind: AgentKind) -> bool {
        self.supported_kinds.contains(&kind)
    }

    /// Whether the module supports an orchestration mode.
    pub fn supports_mode(&self, mode: OrchestrationMode) -> bool {
        self.supported_modes.contains(&mode)
    }

    /// Whether the module supports a caller role.
    pub fn supports_role(&self, role: UserRole) -> bool {
        self.supported_roles.contains(&role)
    }
}

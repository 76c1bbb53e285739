//! Closed vocabularies shared across descriptors and selection
//!
//! These enums are deliberately final: values arrive from snapshots and
//! request contexts as strings, and unknown values must fail
//! deserialization instead of defaulting.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a registered module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleStatus {
    /// Ready for selection.
    Available,
    /// Still selectable, scheduled for removal.
    Deprecated,
    /// Not yet production-proven.
    Experimental,
    /// A failure of this module aborts the owning chain.
    Critical,
}

impl std::fmt::Display for ModuleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Available => write!(f, "available"),
            Self::Deprecated => write!(f, "deprecated"),
            Self::Experimental => write!(f, "experimental"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

impl Default for ModuleStatus {
    fn default() -> Self {
        Self::Available
    }
}

/// Class of agent a module can serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentKind {
    #[default]
    Orchestrator,
    Analyzer,
    Planner,
    Coder,
    Tester,
    Reviewer,
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Orchestrator => write!(f, "orchestrator"),
            Self::Analyzer => write!(f, "analyzer"),
            Self::Planner => write!(f, "planner"),
            Self::Coder => write!(f, "coder"),
            Self::Tester => write!(f, "tester"),
            Self::Reviewer => write!(f, "reviewer"),
        }
    }
}

/// Operating mode a request runs under.
///
/// Escalation rules move the mode upward; the mode is part of the selection
/// query, so escalating changes which modules qualify on the next request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrchestrationMode {
    #[default]
    Standard,
    Critical,
    Recovery,
}

impl std::fmt::Display for OrchestrationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Standard => write!(f, "STANDARD"),
            Self::Critical => write!(f, "CRITICAL"),
            Self::Recovery => write!(f, "RECOVERY"),
        }
    }
}

/// Caller role class a module supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UserRole {
    Novice,
    Expert,
    Innovator,
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Novice => write!(f, "NOVICE"),
            Self::Expert => write!(f, "EXPERT"),
            Self::Innovator => write!(f, "INNOVATOR"),
        }
    }
}

//! Orchestrator lifecycle events
//!
//! Broadcast on a best-effort channel; slow or absent subscribers never
//! block orchestration.

use serde::Serialize;

use modra_kernel::OrchestrationMode;

/// Something the orchestrator did that observers may care about.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
#[non_exhaustive]
pub enum OrchestratorEvent {
    /// A module instance was created and added to the active set.
    ModuleLoaded { module_id: String },
    /// A module instance was removed from the active set and cleaned up.
    ModuleUnloaded { module_id: String },
    /// An adaptation replaced one active module with another.
    ModuleSwapped { old_id: String, new_id: String },
    /// An adaptation changed the orchestration mode.
    ModeEscalated { mode: OrchestrationMode },
    /// An adaptation loaded modules offering extra capabilities.
    CapabilityLayerAdded {
        features: Vec<String>,
        loaded: Vec<String>,
    },
    /// A request's chain ran to completion.
    ChainCompleted {
        chain_id: String,
        steps: usize,
        latency_ms: f64,
    },
    /// A request's chain aborted on a critical step.
    ChainFailed { chain_id: String, error: String },
}

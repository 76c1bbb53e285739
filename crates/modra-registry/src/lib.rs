//! Modra registry
//!
//! The capability registry: artifact-verified registration, YAML snapshot
//! persistence, context-driven selection with dependency and conflict
//! resolution, and per-module performance tracking.
//!
//! ```rust,ignore
//! let registry = CapabilityRegistry::open("registry.yaml")?;
//! registry.register(descriptor).await?;
//!
//! let query = SelectionContext::new(AgentKind::Orchestrator, mode, role);
//! let modules = registry.select(&query).await;
//! ```

pub mod error;
pub mod integrity;
pub mod registry;
pub mod snapshot;

pub use error::{RegistryError, RegistryResult};
pub use integrity::{fingerprint_bytes, fingerprint_file, verify_artifact};
pub use registry::{
    CapabilityRegistry, EFFECTIVENESS_ALPHA, PerformanceRecord, PerformanceReport, RegistryStats,
};
pub use snapshot::{RegistrySnapshot, SNAPSHOT_VERSION};

//! Modra kernel
//!
//! Contracts shared by every modra crate:
//! - The module contract ([`ProcessingModule`], [`ModuleFactory`])
//! - Capability descriptors and their performance statistics
//! - Execution and selection contexts
//! - Closed status/mode/role vocabularies
//! - The kernel error taxonomy
//!
//! The kernel does no I/O; persistence and execution live in the registry
//! and runtime crates layered on top.

pub mod context;
pub mod descriptor;
pub mod error;
pub mod module;
pub mod types;

pub use context::{
    DEFAULT_MAX_ERROR_RATE, DEFAULT_MIN_EFFECTIVENESS, ExecutionContext, SelectionContext,
};
pub use descriptor::{ModuleDescriptor, PerformanceStats};
pub use error::{ContextError, ContextResult, ModuleError, ModuleResult};
pub use module::{ModuleFactory, ProcessingModule};
pub use types::{AgentKind, ModuleStatus, OrchestrationMode, UserRole};

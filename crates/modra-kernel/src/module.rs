//! Module contract
//!
//! The registry and the chain executor depend only on these traits, never on
//! concrete module types. [`ProcessingModule`] is the unit a chain executes;
//! [`ModuleFactory`] is the instantiation seam the orchestrator goes through
//! when hot-loading a selected module.

use std::sync::Arc;

use async_trait::async_trait;

use crate::context::ExecutionContext;
use crate::error::ModuleResult;

/// One interchangeable processing unit.
///
/// `process` must tolerate being cancelled at its caller's timeout: the chain
/// drops the future on expiry, so an implementation must not leave shared
/// state half-written across await points.
#[async_trait]
pub trait ProcessingModule: Send + Sync {
    /// Transform an input context into an output context.
    async fn process(&self, input: ExecutionContext) -> ModuleResult<ExecutionContext>;

    /// Whether the input satisfies the module's preconditions.
    fn validate_input(&self, _input: &ExecutionContext) -> bool {
        true
    }

    /// Whether the output satisfies the module's postconditions.
    fn validate_output(&self, _output: &ExecutionContext) -> bool {
        true
    }

    /// Release resources. Invoked exactly once when the instance is unloaded.
    async fn cleanup(&self) -> ModuleResult<()> {
        Ok(())
    }
}

/// Produces instances of one module id on demand.
#[async_trait]
pub trait ModuleFactory: Send + Sync {
    /// The module id this factory instantiates.
    fn module_id(&self) -> &str;

    /// Create a fresh instance.
    async fn create(&self) -> ModuleResult<Arc<dyn ProcessingModule>>;
}

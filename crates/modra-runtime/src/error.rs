//! Runtime error taxonomy

use thiserror::Error;

use modra_kernel::{ContextError, ExecutionContext};
use modra_registry::RegistryError;

use crate::config::ConfigError;

/// Errors surfaced by chain execution.
///
/// Non-critical step failures are absorbed by the chain's degraded-mode
/// policy and never appear here; only failures that end the chain do.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ChainError {
    /// A critical-status module's step failed and the chain aborted.
    ///
    /// `context` holds the state accumulated by the steps that completed
    /// before the abort.
    #[error("Critical step {step} ({module_id}) failed: {reason}")]
    CriticalAbort {
        step: usize,
        module_id: String,
        reason: String,
        context: ExecutionContext,
    },

    /// The chain was asked to execute from a non-pending state.
    #[error("Chain not executable: state is {actual}, expected {expected}")]
    InvalidState {
        expected: &'static str,
        actual: String,
    },
}

/// Result alias for chain execution.
pub type ChainResult<T> = Result<T, ChainError>;

/// Errors surfaced by the adaptive orchestrator.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum OrchestratorError {
    /// A selected module could not be hot-loaded.
    #[error("Load failure for module {module_id}: {reason}")]
    LoadFailure { module_id: String, reason: String },

    /// An adaptation referenced a module the registry does not know.
    #[error("Unknown module: {0}")]
    UnknownModule(String),

    /// The merged request context could not back a selection query.
    #[error("Context error: {0}")]
    Context(#[from] ContextError),

    /// Registry operation failed.
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Chain execution ended in an error.
    #[error("Chain error: {0}")]
    Chain(#[from] ChainError),

    /// Orchestrator configuration could not be loaded.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result alias for orchestrator operations.
pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

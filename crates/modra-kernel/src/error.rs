//! Error taxonomy for the kernel contracts

use thiserror::Error;

/// Errors surfaced by module implementations and factories.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ModuleError {
    /// The module's `process` call failed.
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),

    /// The module rejected its input before doing any work.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The module observed cancellation and unwound cleanly.
    #[error("Processing cancelled: {0}")]
    Cancelled(String),

    /// A factory could not produce an instance.
    #[error("Instantiation failed: {0}")]
    CreationFailed(String),

    /// Releasing the module's resources failed.
    #[error("Cleanup failed: {0}")]
    CleanupFailed(String),

    /// Context value (de)serialization failed inside the module.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result alias for module operations.
pub type ModuleResult<T> = Result<T, ModuleError>;

/// Errors raised when an execution context cannot back a typed query.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ContextError {
    /// A required context field is absent.
    #[error("Missing context field: {0}")]
    MissingField(&'static str),

    /// A context field holds a value outside its closed vocabulary.
    #[error("Unknown value for context field {field}: {value}")]
    UnknownValue { field: &'static str, value: String },
}

/// Result alias for context conversions.
pub type ContextResult<T> = Result<T, ContextError>;

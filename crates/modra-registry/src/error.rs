//! Registry error taxonomy

use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the capability registry.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RegistryError {
    /// The backing artifact does not exist.
    #[error("Artifact missing: {0}")]
    ArtifactMissing(PathBuf),

    /// The artifact's content hash does not match the descriptor.
    #[error("Fingerprint mismatch: expected {expected}, actual {actual}")]
    FingerprintMismatch { expected: String, actual: String },

    /// No descriptor is registered under the id.
    #[error("Unknown module: {0}")]
    UnknownModule(String),

    /// Snapshot or artifact I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The snapshot document could not be (de)serialized.
    #[error("Snapshot format error: {0}")]
    Format(#[from] serde_yaml::Error),
}

impl RegistryError {
    /// Whether this is an artifact integrity failure (missing or tampered).
    pub fn is_integrity(&self) -> bool {
        matches!(
            self,
            Self::ArtifactMissing(_) | Self::FingerprintMismatch { .. }
        )
    }
}

/// Result alias for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

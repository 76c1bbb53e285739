//! Artifact integrity
//!
//! The registry never interprets module artifacts; it only proves that the
//! bytes on disk are the bytes the descriptor was registered against. The
//! same check runs at registration and again before every hot load.

use std::path::Path;

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{RegistryError, RegistryResult};

/// Compute the SHA-256 hex fingerprint of a byte slice.
pub fn fingerprint_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Compute the SHA-256 hex fingerprint of a file's content.
pub fn fingerprint_file<P: AsRef<Path>>(path: P) -> RegistryResult<String> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(RegistryError::ArtifactMissing(path.to_path_buf()));
    }
    let content = std::fs::read(path)?;
    Ok(fingerprint_bytes(&content))
}

/// Verify that an artifact exists and matches an expected fingerprint.
pub fn verify_artifact<P: AsRef<Path>>(path: P, expected: &str) -> RegistryResult<()> {
    let path = path.as_ref();
    let actual = fingerprint_file(path)?;

    if actual != expected {
        return Err(RegistryError::FingerprintMismatch {
            expected: expected.to_string(),
            actual,
        });
    }

    debug!("Artifact verified: {}", path.display());
    Ok(())
}

//! Registry snapshot persistence
//!
//! The snapshot is the registry's durable form: a versioned, human-editable
//! YAML document listing every descriptor in registration order. It is
//! loaded wholesale at startup and rewritten wholesale after every
//! successful registration. Performance statistics travel inside the
//! descriptors; the in-process performance log is not persisted.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use modra_kernel::ModuleDescriptor;

use crate::error::RegistryResult;

/// Current snapshot document version.
pub const SNAPSHOT_VERSION: &str = "1.0";

/// The persisted registry document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    /// Document format version.
    pub version: String,
    /// When the snapshot was written.
    pub last_updated: DateTime<Utc>,
    /// Descriptors in registration order.
    #[serde(default)]
    pub modules: Vec<ModuleDescriptor>,
}

impl RegistrySnapshot {
    /// Create a snapshot of the given descriptors, stamped now.
    pub fn new(modules: Vec<ModuleDescriptor>) -> Self {
        Self {
            version: SNAPSHOT_VERSION.to_string(),
            last_updated: Utc::now(),
            modules,
        }
    }

    /// Load a snapshot document from disk.
    pub fn load<P: AsRef<Path>>(path: P) -> RegistryResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let snapshot: RegistrySnapshot = serde_yaml::from_str(&content)?;
        debug!(
            "Loaded snapshot v{} with {} modules from {}",
            snapshot.version,
            snapshot.modules.len(),
            path.as_ref().display()
        );
        Ok(snapshot)
    }

    /// Write the snapshot document to disk, creating parent directories.
    pub fn store<P: AsRef<Path>>(&self, path: P) -> RegistryResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        debug!(
            "Stored snapshot with {} modules to {}",
            self.modules.len(),
            path.display()
        );
        Ok(())
    }
}

//! Capability registry
//!
//! Owns the descriptor set and everything derived from it: artifact-verified
//! registration, context-driven selection with dependency and conflict
//! resolution, and performance recording. Selection never mutates state;
//! `record_performance` is the only performance mutator and is safe to call
//! from concurrently executing chains.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, error, info};

use modra_kernel::{ModuleDescriptor, ModuleStatus, SelectionContext};

use crate::error::{RegistryError, RegistryResult};
use crate::integrity;
use crate::snapshot::RegistrySnapshot;

/// Weight of the newest observation in the effectiveness moving average.
pub const EFFECTIVENESS_ALPHA: f64 = 0.1;

/// One performance observation reported against a module.
///
/// Every field is optional; only the present fields fold into the module's
/// statistics. The raw report is appended to the performance log verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceReport {
    /// Observed effectiveness in `[0, 1]`.
    pub effectiveness: Option<f64>,
    /// Observed latency in milliseconds.
    pub latency_ms: Option<f64>,
    /// Whether the observed call failed.
    pub error_occurred: Option<bool>,
    /// Failure classification (e.g. `timeout`, `load_failure`).
    pub error_kind: Option<String>,
    /// Failure detail.
    pub error_message: Option<String>,
    /// Chain step index the observation came from, if any.
    pub step: Option<usize>,
}

impl PerformanceReport {
    /// Report a successful call.
    pub fn success(effectiveness: f64, latency_ms: f64) -> Self {
        Self {
            effectiveness: Some(effectiveness),
            latency_ms: Some(latency_ms),
            error_occurred: Some(false),
            ..Self::default()
        }
    }

    /// Report a failed call.
    pub fn failure(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_occurred: Some(true),
            error_kind: Some(kind.into()),
            error_message: Some(message.into()),
            ..Self::default()
        }
    }

    /// Attach the chain step index.
    pub fn with_step(mut self, step: usize) -> Self {
        self.step = Some(step);
        self
    }
}

/// Performance-log entry: one raw report plus when and for whom.
#[derive(Debug, Clone, Serialize)]
pub struct PerformanceRecord {
    /// When the report was recorded.
    pub timestamp: DateTime<Utc>,
    /// Module the report targets.
    pub module_id: String,
    /// The raw report.
    pub metrics: PerformanceReport,
}

/// Registry statistics.
#[derive(Debug, Clone, Default)]
pub struct RegistryStats {
    /// Total registered modules.
    pub total_modules: usize,
    /// Modules with status `available`.
    pub available: usize,
    /// Modules with status `deprecated`.
    pub deprecated: usize,
    /// Modules with status `experimental`.
    pub experimental: usize,
    /// Modules with status `critical`.
    pub critical: usize,
    /// Sum of all usage counts.
    pub total_usage: u64,
    /// Performance-log length.
    pub performance_events: usize,
}

struct RegistryState {
    /// Descriptors keyed by id.
    modules: HashMap<String, ModuleDescriptor>,
    /// Registration order; re-registering an id keeps its original slot.
    insertion_order: Vec<String>,
    /// Append-only observation log, process lifetime only.
    performance_log: Vec<PerformanceRecord>,
}

/// Capability registry backed by a YAML snapshot.
pub struct CapabilityRegistry {
    state: Arc<RwLock<RegistryState>>,
    snapshot_path: PathBuf,
}

impl CapabilityRegistry {
    /// Open a registry at a snapshot path.
    ///
    /// If the snapshot exists it is loaded wholesale; otherwise the registry
    /// starts empty and the file is created on the first registration.
    pub fn open<P: AsRef<Path>>(path: P) -> RegistryResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut modules = HashMap::new();
        let mut insertion_order = Vec::new();

        if path.exists() {
            let snapshot = RegistrySnapshot::load(&path)?;
            info!(
                "Opened registry with {} modules from {}",
                snapshot.modules.len(),
                path.display()
            );
            for descriptor in snapshot.modules {
                if !modules.contains_key(&descriptor.id) {
                    insertion_order.push(descriptor.id.clone());
                }
                modules.insert(descriptor.id.clone(), descriptor);
            }
        } else {
            info!("Opened empty registry at {}", path.display());
        }

        Ok(Self {
            state: Arc::new(RwLock::new(RegistryState {
                modules,
                insertion_order,
                performance_log: Vec::new(),
            })),
            snapshot_path: path,
        })
    }

    /// The snapshot path this registry persists to.
    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }

    /// Register a descriptor after verifying its artifact, then persist.
    ///
    /// Inserts or replaces the descriptor keyed by id. The operation is
    /// all-or-nothing: on any failure (integrity or persistence) the registry
    /// is left exactly as it was.
    pub async fn register(&self, descriptor: ModuleDescriptor) -> RegistryResult<()> {
        if let Err(err) =
            integrity::verify_artifact(&descriptor.artifact_path, &descriptor.fingerprint)
        {
            error!("Registration of {} rejected: {}", descriptor.id, err);
            return Err(err);
        }

        let id = descriptor.id.clone();
        let mut state = self.state.write().await;

        let previous = state.modules.insert(id.clone(), descriptor);
        if previous.is_none() {
            state.insertion_order.push(id.clone());
        }

        if let Err(err) = Self::persist(&state, &self.snapshot_path) {
            // Roll back so a failed persist never leaves phantom state.
            match previous {
                Some(prev) => {
                    state.modules.insert(id.clone(), prev);
                }
                None => {
                    state.modules.remove(&id);
                    state.insertion_order.pop();
                }
            }
            error!("Registration of {} rolled back: {}", id, err);
            return Err(err);
        }

        info!("Registered module: {}", id);
        Ok(())
    }

    /// Select the modules matching a query, dependency-closed and
    /// conflict-free, in deterministic order. Never mutates registry state.
    pub async fn select(&self, query: &SelectionContext) -> Vec<ModuleDescriptor> {
        let state = self.state.read().await;

        // Filter in registration order so later ties stay deterministic.
        let mut candidates: Vec<&ModuleDescriptor> = state
            .insertion_order
            .iter()
            .filter_map(|id| state.modules.get(id))
            .filter(|descriptor| Self::matches(descriptor, query))
            .collect();

        // Rank: best effectiveness first, then lowest error rate, then most
        // recently used. The sort is stable, so equal ranks keep
        // registration order.
        candidates.sort_by(|a, b| {
            b.performance
                .effectiveness
                .total_cmp(&a.performance.effectiveness)
                .then_with(|| {
                    a.performance
                        .error_rate
                        .total_cmp(&b.performance.error_rate)
                })
                .then_with(|| b.performance.last_used.cmp(&a.performance.last_used))
        });

        debug!(
            "Selection matched {} of {} modules",
            candidates.len(),
            state.insertion_order.len()
        );

        // Resolve: walk ranked candidates, pulling dependencies in before
        // each candidate. Dependencies are included unconditionally (not
        // re-filtered) and are never retracted once included.
        let mut selected: Vec<ModuleDescriptor> = Vec::new();
        let mut included: HashSet<String> = HashSet::new();

        for candidate in candidates {
            if Self::conflicts_with_selection(candidate, &included, &selected) {
                debug!("Module {} skipped: conflicts with selection", candidate.id);
                continue;
            }

            let mut visiting = HashSet::new();
            visiting.insert(candidate.id.clone());
            Self::expand_dependencies(
                &state.modules,
                candidate,
                &mut selected,
                &mut included,
                &mut visiting,
            );

            if included.insert(candidate.id.clone()) {
                selected.push(candidate.clone());
            }
        }

        selected
    }

    fn matches(descriptor: &ModuleDescriptor, query: &SelectionContext) -> bool {
        descriptor.supports_kind(query.agent_kind)
            && descriptor.supports_mode(query.mode)
            && descriptor.supports_role(query.role)
            && query
                .required_features
                .iter()
                .all(|feature| descriptor.offers(feature))
            && descriptor.performance.effectiveness >= query.min_effectiveness
            && descriptor.performance.error_rate <= query.max_error_rate
    }

    /// Conflict check in both directions: the candidate listing an included
    /// id, or an included descriptor listing the candidate.
    fn conflicts_with_selection(
        candidate: &ModuleDescriptor,
        included: &HashSet<String>,
        selected: &[ModuleDescriptor],
    ) -> bool {
        candidate.conflicts.iter().any(|id| included.contains(id))
            || selected
                .iter()
                .any(|module| module.conflicts.iter().any(|id| id == &candidate.id))
    }

    fn expand_dependencies(
        modules: &HashMap<String, ModuleDescriptor>,
        module: &ModuleDescriptor,
        selected: &mut Vec<ModuleDescriptor>,
        included: &mut HashSet<String>,
        visiting: &mut HashSet<String>,
    ) {
        for dep_id in &module.dependencies {
            if included.contains(dep_id) || !visiting.insert(dep_id.clone()) {
                continue;
            }
            let Some(dependency) = modules.get(dep_id) else {
                debug!("Dependency {} of {} not registered, skipped", dep_id, module.id);
                continue;
            };
            Self::expand_dependencies(modules, dependency, selected, included, visiting);
            if included.insert(dep_id.clone()) {
                selected.push(dependency.clone());
            }
        }
    }

    /// Fold one observation into a module's statistics and append it to the
    /// performance log. A report against an unknown id is ignored entirely.
    pub async fn record_performance(&self, module_id: &str, report: PerformanceReport) {
        let mut state = self.state.write().await;

        let Some(descriptor) = state.modules.get_mut(module_id) else {
            debug!("Performance report for unknown module {} ignored", module_id);
            return;
        };

        let stats = &mut descriptor.performance;
        stats.usage_count += 1;
        stats.last_used = Some(Utc::now());
        let count = stats.usage_count as f64;

        if let Some(effectiveness) = report.effectiveness {
            stats.effectiveness = EFFECTIVENESS_ALPHA * effectiveness
                + (1.0 - EFFECTIVENESS_ALPHA) * stats.effectiveness;
        }
        if let Some(error_occurred) = report.error_occurred {
            let observed = if error_occurred { 1.0 } else { 0.0 };
            stats.error_rate = (stats.error_rate * (count - 1.0) + observed) / count;
        }
        if let Some(latency_ms) = report.latency_ms {
            stats.avg_latency_ms = (stats.avg_latency_ms * (count - 1.0) + latency_ms) / count;
        }

        state.performance_log.push(PerformanceRecord {
            timestamp: Utc::now(),
            module_id: module_id.to_string(),
            metrics: report,
        });
    }

    /// Get a descriptor by id.
    pub async fn get(&self, module_id: &str) -> Option<ModuleDescriptor> {
        let state = self.state.read().await;
        state.modules.get(module_id).cloned()
    }

    /// Whether a module is registered.
    pub async fn contains(&self, module_id: &str) -> bool {
        let state = self.state.read().await;
        state.modules.contains_key(module_id)
    }

    /// Whether a module carries critical status. Unknown ids are not critical.
    pub async fn is_critical(&self, module_id: &str) -> bool {
        let state = self.state.read().await;
        state
            .modules
            .get(module_id)
            .map(|descriptor| descriptor.is_critical())
            .unwrap_or(false)
    }

    /// Re-verify a registered module's artifact against its fingerprint.
    pub async fn verify_integrity(&self, module_id: &str) -> RegistryResult<()> {
        let descriptor = self
            .get(module_id)
            .await
            .ok_or_else(|| RegistryError::UnknownModule(module_id.to_string()))?;
        integrity::verify_artifact(&descriptor.artifact_path, &descriptor.fingerprint)
    }

    /// All descriptors in registration order.
    pub async fn list(&self) -> Vec<ModuleDescriptor> {
        let state = self.state.read().await;
        state
            .insertion_order
            .iter()
            .filter_map(|id| state.modules.get(id))
            .cloned()
            .collect()
    }

    /// Registered ids in registration order.
    pub async fn module_ids(&self) -> Vec<String> {
        let state = self.state.read().await;
        state.insertion_order.clone()
    }

    /// The raw performance log.
    pub async fn performance_log(&self) -> Vec<PerformanceRecord> {
        let state = self.state.read().await;
        state.performance_log.clone()
    }

    /// Registry statistics.
    pub async fn stats(&self) -> RegistryStats {
        let state = self.state.read().await;

        let mut stats = RegistryStats {
            total_modules: state.modules.len(),
            performance_events: state.performance_log.len(),
            ..RegistryStats::default()
        };

        for descriptor in state.modules.values() {
            match descriptor.status {
                ModuleStatus::Available => stats.available += 1,
                ModuleStatus::Deprecated => stats.deprecated += 1,
                ModuleStatus::Experimental => stats.experimental += 1,
                ModuleStatus::Critical => stats.critical += 1,
            }
            stats.total_usage += descriptor.performance.usage_count;
        }

        stats
    }

    /// Persist the current descriptor set to the snapshot path.
    pub async fn flush(&self) -> RegistryResult<()> {
        let state = self.state.read().await;
        Self::persist(&state, &self.snapshot_path)
    }

    fn persist(state: &RegistryState, path: &Path) -> RegistryResult<()> {
        let modules = state
            .insertion_order
            .iter()
            .filter_map(|id| state.modules.get(id))
            .cloned()
            .collect();
        RegistrySnapshot::new(modules).store(path)
    }
}

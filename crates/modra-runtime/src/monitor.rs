//! Run history
//!
//! The monitor keeps one record per orchestrated request, successes and
//! failures alike, so operators can inspect what the orchestrator has been
//! doing without trawling logs.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

/// How a run ended.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    /// The chain ran every step, possibly degraded.
    Completed { chain_id: String, steps: usize },
    /// The chain aborted or the orchestrator failed before running it.
    Failed {
        error_kind: String,
        error_message: String,
    },
}

/// One orchestrated request, as remembered by the monitor.
#[derive(Debug, Clone, Serialize)]
pub struct RunRecord {
    /// When the run finished.
    pub timestamp: DateTime<Utc>,
    /// End-to-end latency in milliseconds.
    pub latency_ms: f64,
    /// How the run ended.
    pub outcome: RunOutcome,
}

impl RunRecord {
    /// Record a completed run.
    pub fn completed(chain_id: &str, steps: usize, latency_ms: f64) -> Self {
        Self {
            timestamp: Utc::now(),
            latency_ms,
            outcome: RunOutcome::Completed {
                chain_id: chain_id.to_string(),
                steps,
            },
        }
    }

    /// Record a failed run.
    pub fn failed(error_kind: &str, error_message: &str, latency_ms: f64) -> Self {
        Self {
            timestamp: Utc::now(),
            latency_ms,
            outcome: RunOutcome::Failed {
                error_kind: error_kind.to_string(),
                error_message: error_message.to_string(),
            },
        }
    }
}

/// Append-only, shareable run history.
#[derive(Clone, Default)]
pub struct RunMonitor {
    runs: Arc<RwLock<Vec<RunRecord>>>,
}

impl RunMonitor {
    /// Create an empty monitor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a run record.
    pub async fn record(&self, record: RunRecord) {
        self.runs.write().await.push(record);
    }

    /// All recorded runs, oldest first.
    pub async fn history(&self) -> Vec<RunRecord> {
        self.runs.read().await.clone()
    }

    /// Number of recorded runs.
    pub async fn run_count(&self) -> usize {
        self.runs.read().await.len()
    }

    /// Number of recorded failures.
    pub async fn failure_count(&self) -> usize {
        self.runs
            .read()
            .await
            .iter()
            .filter(|record| matches!(record.outcome, RunOutcome::Failed { .. }))
            .count()
    }
}

//! Adaptation rules
//!
//! After each completed request the orchestrator folds the run into a
//! [`RuleMetrics`] snapshot and asks the rule engine what to change. Rules
//! are pure functions over that snapshot; applying the resulting
//! [`Adaptation`]s is the orchestrator's job.

use serde::{Deserialize, Serialize};

use modra_kernel::OrchestrationMode;

use crate::config::SwapPair;

/// Risk score above which the security layer is requested.
pub const SECURITY_RISK_THRESHOLD: f64 = 0.7;
/// Chain latency in seconds above which the slow module gets swapped out.
pub const LATENCY_THRESHOLD_SECONDS: f64 = 10.0;
/// Aggregate quality below which the orchestrator escalates to CRITICAL.
pub const QUALITY_FLOOR: f64 = 0.5;
/// User satisfaction below which the orchestrator escalates to RECOVERY.
pub const SATISFACTION_FLOOR: f64 = 0.3;

/// A change the rule engine asks the orchestrator to make.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Adaptation {
    /// Replace one active module with another.
    SwapModule {
        old_id: String,
        new_id: String,
        reason: String,
    },
    /// Change the orchestration mode for subsequent requests.
    EscalateMode {
        mode: OrchestrationMode,
        reason: String,
    },
    /// Load extra modules offering the given capabilities.
    AddCapabilityLayer {
        features: Vec<String>,
        reason: String,
    },
}

/// Snapshot of one completed run, as seen by the rules.
#[derive(Debug, Clone)]
pub struct RuleMetrics {
    /// End-to-end chain latency in seconds.
    pub latency_seconds: f64,
    /// Aggregate result quality, 0.0 when the run reported none.
    pub quality: f64,
    /// Security risk score reported by the run.
    pub risk: f64,
    /// User satisfaction reported by the run.
    pub satisfaction: f64,
    /// Ids of the modules that were active during the run.
    pub active_modules: Vec<String>,
}

impl Default for RuleMetrics {
    fn default() -> Self {
        Self {
            latency_seconds: 0.0,
            quality: 1.0,
            risk: 0.0,
            satisfaction: 1.0,
            active_modules: Vec::new(),
        }
    }
}

/// Evaluates the built-in adaptation rules against run metrics.
#[derive(Debug, Clone)]
pub struct AdaptationRuleEngine {
    swap_pair: SwapPair,
}

impl Default for AdaptationRuleEngine {
    fn default() -> Self {
        Self {
            swap_pair: SwapPair {
                slow: "complex_reasoning".to_string(),
                fast: "fast_reasoning".to_string(),
            },
        }
    }
}

impl AdaptationRuleEngine {
    /// Create an engine with the default swap pair.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the slow/fast pair used by the latency rule.
    pub fn with_swap_pair(mut self, pair: SwapPair) -> Self {
        self.swap_pair = pair;
        self
    }

    /// Run every rule and collect the requested adaptations, in rule order.
    pub fn evaluate(&self, metrics: &RuleMetrics) -> Vec<Adaptation> {
        [
            self.security_escalation(metrics),
            self.performance_degradation(metrics),
            self.quality_improvement(metrics),
            self.user_frustration(metrics),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    fn security_escalation(&self, metrics: &RuleMetrics) -> Option<Adaptation> {
        if metrics.risk > SECURITY_RISK_THRESHOLD {
            return Some(Adaptation::AddCapabilityLayer {
                features: vec!["enhanced_security".to_string()],
                reason: format!(
                    "security risk {:.2} above threshold {SECURITY_RISK_THRESHOLD}",
                    metrics.risk
                ),
            });
        }
        None
    }

    fn performance_degradation(&self, metrics: &RuleMetrics) -> Option<Adaptation> {
        if metrics.latency_seconds > LATENCY_THRESHOLD_SECONDS
            && metrics
                .active_modules
                .iter()
                .any(|id| id == &self.swap_pair.slow)
        {
            return Some(Adaptation::SwapModule {
                old_id: self.swap_pair.slow.clone(),
                new_id: self.swap_pair.fast.clone(),
                reason: format!(
                    "latency {:.1}s above threshold {LATENCY_THRESHOLD_SECONDS}s",
                    metrics.latency_seconds
                ),
            });
        }
        None
    }

    fn quality_improvement(&self, metrics: &RuleMetrics) -> Option<Adaptation> {
        if metrics.quality < QUALITY_FLOOR {
            return Some(Adaptation::EscalateMode {
                mode: OrchestrationMode::Critical,
                reason: format!("quality {:.2} below floor {QUALITY_FLOOR}", metrics.quality),
            });
        }
        None
    }

    fn user_frustration(&self, metrics: &RuleMetrics) -> Option<Adaptation> {
        if metrics.satisfaction < SATISFACTION_FLOOR {
            return Some(Adaptation::EscalateMode {
                mode: OrchestrationMode::Recovery,
                reason: format!(
                    "satisfaction {:.2} below floor {SATISFACTION_FLOOR}",
                    metrics.satisfaction
                ),
            });
        }
        None
    }
}

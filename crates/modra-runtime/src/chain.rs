//! Module chain executor
//!
//! A chain runs an ordered list of steps against one mutable context. Steps
//! are strictly sequential: each step's input is a projection of the context
//! every prior step has already mutated. Failures are isolated per step:
//! a non-critical failure marks the context degraded and execution continues,
//! a critical failure aborts the chain. Every outcome is reported to the
//! registry so selection reflects what actually happened.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use modra_kernel::{ExecutionContext, ProcessingModule};
use modra_registry::{CapabilityRegistry, PerformanceReport};

use crate::error::{ChainError, ChainResult};

/// Step timeout applied when a step does not configure one.
pub const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_secs(30);

/// Execution state of a [`ModuleChain`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainState {
    /// Built, not yet executed.
    Pending,
    /// Executing.
    Running,
    /// Every step ran; non-critical failures may have degraded the context.
    Completed,
    /// A critical step failed; execution stopped early.
    Aborted,
}

impl std::fmt::Display for ChainState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

/// Classification attached to failed-step performance reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepErrorKind {
    InputValidation,
    OutputValidation,
    Timeout,
    Processing,
}

impl std::fmt::Display for StepErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InputValidation => write!(f, "input_validation"),
            Self::OutputValidation => write!(f, "output_validation"),
            Self::Timeout => write!(f, "timeout"),
            Self::Processing => write!(f, "processing"),
        }
    }
}

/// One step of a chain: a module instance plus its execution policy.
pub struct ChainStep {
    /// Id the step reports performance under.
    pub module_id: String,
    /// The module instance to invoke.
    pub module: Arc<dyn ProcessingModule>,
    /// Context projection feeding the step (target key -> source key).
    /// Empty means the full context passes through.
    pub input_mapping: HashMap<String, String>,
    /// Projection applied to the step's result before merging it back.
    pub output_mapping: HashMap<String, String>,
    /// Whether input/output validation hooks run.
    pub validation_required: bool,
    /// Budget for the `process` call.
    pub timeout: Duration,
}

impl ChainStep {
    /// Create a step with full-context passthrough, validation on, and the
    /// default timeout.
    pub fn new(module_id: &str, module: Arc<dyn ProcessingModule>) -> Self {
        Self {
            module_id: module_id.to_string(),
            module,
            input_mapping: HashMap::new(),
            output_mapping: HashMap::new(),
            validation_required: true,
            timeout: DEFAULT_STEP_TIMEOUT,
        }
    }

    /// Set the input projection.
    pub fn with_input_mapping(mut self, mapping: HashMap<String, String>) -> Self {
        self.input_mapping = mapping;
        self
    }

    /// Set the output projection.
    pub fn with_output_mapping(mut self, mapping: HashMap<String, String>) -> Self {
        self.output_mapping = mapping;
        self
    }

    /// Enable or disable validation hooks.
    pub fn with_validation(mut self, required: bool) -> Self {
        self.validation_required = required;
        self
    }

    /// Override the step timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Post-hoc record of one successfully executed step.
#[derive(Debug, Clone, Serialize)]
pub struct StepTrace {
    /// Step index within the chain.
    pub step: usize,
    /// Module that ran.
    pub module_id: String,
    /// The projected input the module saw.
    pub input: ExecutionContext,
    /// The raw result the module produced.
    pub output: ExecutionContext,
    /// Wall-clock step latency in milliseconds.
    pub latency_ms: f64,
}

/// Per-step line of an [`ExecutionSummary`].
#[derive(Debug, Clone, Serialize)]
pub struct StepSummary {
    pub step: usize,
    pub module_id: String,
    pub latency_ms: f64,
}

/// Inspection view of a chain after (or during) execution.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionSummary {
    /// Chain id.
    pub chain_id: String,
    /// Current chain state.
    pub state: ChainState,
    /// Steps the chain was built with.
    pub steps_total: usize,
    /// Steps that completed successfully.
    pub steps_executed: usize,
    /// One line per successful step.
    pub steps: Vec<StepSummary>,
}

/// An ordered, fault-isolated sequence of module steps.
pub struct ModuleChain {
    id: String,
    registry: Arc<CapabilityRegistry>,
    steps: Vec<ChainStep>,
    state: ChainState,
    history: Vec<StepTrace>,
}

impl ModuleChain {
    /// Create an empty chain reporting to the given registry.
    pub fn new(registry: Arc<CapabilityRegistry>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            registry,
            steps: Vec::new(),
            state: ChainState::Pending,
            history: Vec::new(),
        }
    }

    /// Append a step.
    pub fn add_step(&mut self, step: ChainStep) {
        self.steps.push(step);
    }

    /// Chain id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current state.
    pub fn state(&self) -> ChainState {
        self.state
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the chain has no steps.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Traces of the successfully executed steps, in order.
    pub fn history(&self) -> &[StepTrace] {
        &self.history
    }

    /// Summarize the chain for post-hoc inspection.
    pub fn execution_summary(&self) -> ExecutionSummary {
        ExecutionSummary {
            chain_id: self.id.clone(),
            state: self.state,
            steps_total: self.steps.len(),
            steps_executed: self.history.len(),
            steps: self
                .history
                .iter()
                .map(|trace| StepSummary {
                    step: trace.step,
                    module_id: trace.module_id.clone(),
                    latency_ms: trace.latency_ms,
                })
                .collect(),
        }
    }

    /// Run every step in order against the initial context.
    ///
    /// `&mut self` keeps executions exclusive: a chain instance runs once.
    /// Returns the final context, which carries `error_in_step` and
    /// `degraded_mode` markers when a non-critical step failed along the way.
    pub async fn execute(&mut self, initial: ExecutionContext) -> ChainResult<ExecutionContext> {
        if self.state != ChainState::Pending {
            return Err(ChainError::InvalidState {
                expected: "pending",
                actual: self.state.to_string(),
            });
        }
        self.state = ChainState::Running;
        info!("Chain {} starting with {} steps", self.id, self.steps.len());

        let mut context = initial;

        for (index, step) in self.steps.iter().enumerate() {
            let step_input = context.project(&step.input_mapping);
            let started = Instant::now();
            let outcome = Self::run_step(step, step_input.clone()).await;
            let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

            match outcome {
                Ok(result) => {
                    debug!(
                        "Chain {} step {} ({}) completed in {:.1}ms",
                        self.id, index, step.module_id, latency_ms
                    );
                    context.merge(&result.project(&step.output_mapping));

                    let effectiveness = result.get_f64("quality_score").unwrap_or(1.0);
                    self.registry
                        .record_performance(
                            &step.module_id,
                            PerformanceReport::success(effectiveness, latency_ms)
                                .with_step(index),
                        )
                        .await;

                    self.history.push(StepTrace {
                        step: index,
                        module_id: step.module_id.clone(),
                        input: step_input,
                        output: result,
                        latency_ms,
                    });
                }
                Err((kind, reason)) => {
                    self.registry
                        .record_performance(
                            &step.module_id,
                            PerformanceReport::failure(kind.to_string(), reason.clone())
                                .with_step(index),
                        )
                        .await;

                    if self.registry.is_critical(&step.module_id).await {
                        error!(
                            "Chain {} aborted: critical step {} ({}) failed: {}",
                            self.id, index, step.module_id, reason
                        );
                        self.state = ChainState::Aborted;
                        return Err(ChainError::CriticalAbort {
                            step: index,
                            module_id: step.module_id.clone(),
                            reason,
                            context,
                        });
                    }

                    warn!(
                        "Chain {} continuing degraded: step {} ({}) failed: {}",
                        self.id, index, step.module_id, reason
                    );
                    context.set("error_in_step", index);
                    context.set("degraded_mode", true);
                }
            }
        }

        self.state = ChainState::Completed;
        info!("Chain {} completed", self.id);
        Ok(context)
    }

    async fn run_step(
        step: &ChainStep,
        input: ExecutionContext,
    ) -> Result<ExecutionContext, (StepErrorKind, String)> {
        if step.validation_required && !step.module.validate_input(&input) {
            return Err((
                StepErrorKind::InputValidation,
                format!("input rejected by {}", step.module_id),
            ));
        }

        let result = match tokio::time::timeout(step.timeout, step.module.process(input)).await {
            Ok(Ok(result)) => result,
            Ok(Err(err)) => return Err((StepErrorKind::Processing, err.to_string())),
            Err(_) => {
                return Err((
                    StepErrorKind::Timeout,
                    format!("step exceeded its {:?} budget", step.timeout),
                ));
            }
        };

        if step.validation_required && !step.module.validate_output(&result) {
            return Err((
                StepErrorKind::OutputValidation,
                format!("output rejected by {}", step.module_id),
            ));
        }

        Ok(result)
    }
}

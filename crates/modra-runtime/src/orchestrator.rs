//! Adaptive orchestrator
//!
//! The orchestrator ties the registry, the chain executor, and the rule
//! engine together. Each request re-selects the module set, hot-swaps the
//! active instances to match, runs the chain, and then lets the rule engine
//! adapt the system for the next request. The whole swap/build/execute
//! sequence runs inside one critical section per orchestrator instance, so
//! a chain is never built against a half-updated active set. Requests across
//! orchestrator instances run in parallel.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::{broadcast, Mutex};
use tracing::{error, info, warn};

use modra_kernel::{
    ExecutionContext, ModuleDescriptor, ModuleFactory, OrchestrationMode, PerformanceStats,
    ProcessingModule, SelectionContext,
};
use modra_registry::{CapabilityRegistry, PerformanceReport};

use crate::adaptation::{Adaptation, AdaptationRuleEngine, RuleMetrics};
use crate::chain::{ChainStep, ModuleChain, DEFAULT_STEP_TIMEOUT};
use crate::config::OrchestratorConfig;
use crate::error::{ChainError, OrchestratorError, OrchestratorResult};
use crate::events::OrchestratorEvent;
use crate::monitor::{RunMonitor, RunRecord};

/// Capacity of the event broadcast channel.
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Caller-supplied overrides for the chain step built for one module id.
#[derive(Debug, Clone, Default)]
pub struct StepConfig {
    /// Input projection (target key -> source key).
    pub input_mapping: HashMap<String, String>,
    /// Output projection.
    pub output_mapping: HashMap<String, String>,
    /// Override for the validation flag.
    pub validation_required: Option<bool>,
    /// Override for the step timeout.
    pub timeout: Option<Duration>,
}

impl StepConfig {
    /// Create an empty override set.
    pub fn new() -> Self {
        Self::default()
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

    /// Enable or disable validation for the step.
    pub fn with_validation(mut self, required: bool) -> Self {
        self.validation_required = Some(required);
        self
    }

    /// Override the step timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn apply(&self, mut step: ChainStep) -> ChainStep {
        if !self.input_mapping.is_empty() {
            step = step.with_input_mapping(self.input_mapping.clone());
        }
        if !self.output_mapping.is_empty() {
            step = step.with_output_mapping(self.output_mapping.clone());
        }
        if let Some(required) = self.validation_required {
            step = step.with_validation(required);
        }
        if let Some(timeout) = self.timeout {
            step = step.with_timeout(timeout);
        }
        step
    }
}

/// Operator-facing snapshot of the orchestrator.
#[derive(Debug, Clone, Serialize)]
pub struct OrchestratorStatus {
    /// Active module ids, sorted.
    pub active_modules: Vec<String>,
    /// Current orchestration mode.
    pub mode: OrchestrationMode,
    /// Deployment environment from the base context.
    pub environment: String,
    /// Registry performance snapshot for each active module.
    pub module_performance: HashMap<String, PerformanceStats>,
}

/// State guarded by the orchestrator's critical section.
struct OrchestratorState {
    /// Context every request starts from. Holds the current orchestration
    /// mode, which adaptations mutate.
    base_context: ExecutionContext,
    /// Live module instances keyed by id.
    active: HashMap<String, Arc<dyn ProcessingModule>>,
}

/// Orchestrator that re-selects, hot-swaps, and adapts per request.
pub struct AdaptiveOrchestrator {
    registry: Arc<CapabilityRegistry>,
    factories: HashMap<String, Arc<dyn ModuleFactory>>,
    step_configs: HashMap<String, StepConfig>,
    rules: AdaptationRuleEngine,
    monitor: RunMonitor,
    event_tx: broadcast::Sender<OrchestratorEvent>,
    default_step_timeout: Duration,
    state: Mutex<OrchestratorState>,
}

impl AdaptiveOrchestrator {
    /// Create an orchestrator over a registry with the given base context.
    ///
    /// The base context is seeded with `orchestration_mode: STANDARD` when it
    /// does not already carry a mode; mode escalations mutate that key.
    pub fn new(registry: Arc<CapabilityRegistry>, base_context: ExecutionContext) -> Self {
        let mut base_context = base_context;
        if !base_context.contains_key("orchestration_mode") {
            base_context.set("orchestration_mode", OrchestrationMode::default());
        }

        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            registry,
            factories: HashMap::new(),
            step_configs: HashMap::new(),
            rules: AdaptationRuleEngine::new(),
            monitor: RunMonitor::new(),
            event_tx,
            default_step_timeout: DEFAULT_STEP_TIMEOUT,
            state: Mutex::new(OrchestratorState {
                base_context,
                active: HashMap::new(),
            }),
        }
    }

    /// Build an orchestrator from a loaded configuration: open the registry
    /// at the configured snapshot path and assemble the base context.
    pub fn from_config(config: &OrchestratorConfig) -> OrchestratorResult<Self> {
        let registry = Arc::new(CapabilityRegistry::open(&config.registry_path)?);

        let mut rules = AdaptationRuleEngine::new();
        if let Some(pair) = &config.swap_pair {
            rules = rules.with_swap_pair(pair.clone());
        }

        Ok(Self::new(registry, config.base_context())
            .with_rule_engine(rules)
            .with_default_step_timeout(config.default_step_timeout()))
    }

    /// Build an orchestrator from a YAML config file.
    pub fn from_config_file(path: impl AsRef<Path>) -> OrchestratorResult<Self> {
        Self::from_config(&OrchestratorConfig::load(path)?)
    }

    /// Register a factory for the module id the factory declares.
    pub fn with_factory(mut self, factory: Arc<dyn ModuleFactory>) -> Self {
        self.factories
            .insert(factory.module_id().to_string(), factory);
        self
    }

    /// Replace the adaptation rule engine.
    pub fn with_rule_engine(mut self, rules: AdaptationRuleEngine) -> Self {
        self.rules = rules;
        self
    }

    /// Set the timeout applied to steps without their own override.
    pub fn with_default_step_timeout(mut self, timeout: Duration) -> Self {
        self.default_step_timeout = timeout;
        self
    }

    /// Configure the chain step built for one module id.
    pub fn with_step_config(mut self, module_id: &str, config: StepConfig) -> Self {
        self.step_configs.insert(module_id.to_string(), config);
        self
    }

    /// The registry this orchestrator selects from.
    pub fn registry(&self) -> Arc<CapabilityRegistry> {
        self.registry.clone()
    }

    /// Handle to the run history.
    pub fn monitor(&self) -> RunMonitor {
        self.monitor.clone()
    }

    /// Subscribe to orchestrator events.
    pub fn subscribe(&self) -> broadcast::Receiver<OrchestratorEvent> {
        self.event_tx.subscribe()
    }

    /// Currently active module ids, sorted.
    pub async fn active_modules(&self) -> Vec<String> {
        let state = self.state.lock().await;
        let mut ids: Vec<String> = state.active.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Snapshot the orchestrator for inspection.
    pub async fn status(&self) -> OrchestratorStatus {
        let state = self.state.lock().await;
        let mut active: Vec<String> = state.active.keys().cloned().collect();
        active.sort();

        let mut module_performance = HashMap::new();
        for id in &active {
            if let Some(descriptor) = self.registry.get(id).await {
                module_performance.insert(id.clone(), descriptor.performance);
            }
        }

        OrchestratorStatus {
            mode: state
                .base_context
                .get("orchestration_mode")
                .and_then(|value| serde_json::from_value(value.clone()).ok())
                .unwrap_or_default(),
            environment: state
                .base_context
                .get_str("environment")
                .unwrap_or("unknown")
                .to_string(),
            active_modules: active,
            module_performance,
        }
    }

    /// Process one request end to end.
    ///
    /// Merges the request over the base context (request keys win), selects
    /// and hot-swaps modules, executes the chain, and applies whatever
    /// adaptations the rule engine derives from the run. A chain failure
    /// records a failure event and forces a RECOVERY escalation before the
    /// error is returned: the failing call fails, the next call runs adapted.
    pub async fn process(&self, request: ExecutionContext) -> OrchestratorResult<ExecutionContext> {
        let mut state = self.state.lock().await;
        let started = Instant::now();

        let mut context = state.base_context.clone();
        context.merge(&request);

        let query = SelectionContext::try_from(&context)?;
        let selected = self.registry.select(&query).await;
        info!("Selected {} modules for request", selected.len());

        self.sync_active_modules(&mut state, &selected).await?;

        let mut chain = self.build_chain(&state, &selected);
        let chain_id = chain.id().to_string();

        match chain.execute(context).await {
            Ok(result) => {
                let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
                self.monitor
                    .record(RunRecord::completed(&chain_id, chain.len(), latency_ms))
                    .await;
                self.emit(OrchestratorEvent::ChainCompleted {
                    chain_id,
                    steps: chain.len(),
                    latency_ms,
                });

                let metrics = Self::run_metrics(&state, &result, latency_ms);
                for adaptation in self.rules.evaluate(&metrics) {
                    self.apply_adaptation(&mut state, &query, adaptation)
                        .await?;
                }

                Ok(result)
            }
            Err(err) => {
                let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
                let kind = match &err {
                    ChainError::CriticalAbort { .. } => "critical_abort",
                    ChainError::InvalidState { .. } => "invalid_state",
                };
                self.monitor
                    .record(RunRecord::failed(kind, &err.to_string(), latency_ms))
                    .await;
                self.emit(OrchestratorEvent::ChainFailed {
                    chain_id,
                    error: err.to_string(),
                });
                self.escalate_mode(
                    &mut state,
                    OrchestrationMode::Recovery,
                    "chain failure forces recovery",
                );
                Err(err.into())
            }
        }
    }

    /// Diff the active set against the selection: unload stale instances,
    /// load missing ones.
    async fn sync_active_modules(
        &self,
        state: &mut OrchestratorState,
        selected: &[ModuleDescriptor],
    ) -> OrchestratorResult<()> {
        let required: HashSet<&str> = selected.iter().map(|d| d.id.as_str()).collect();
        let stale: Vec<String> = state
            .active
            .keys()
            .filter(|id| !required.contains(id.as_str()))
            .cloned()
            .collect();
        for module_id in stale {
            self.unload_module(state, &module_id).await;
        }

        for descriptor in selected {
            if !state.active.contains_key(&descriptor.id) {
                let module = self.load_module(descriptor).await?;
                state.active.insert(descriptor.id.clone(), module);
                info!("Loaded module: {}", descriptor.id);
                self.emit(OrchestratorEvent::ModuleLoaded {
                    module_id: descriptor.id.clone(),
                });
            }
        }
        Ok(())
    }

    /// Instantiate a module after re-verifying its artifact.
    ///
    /// Any failure is reported to the registry as a `load_failure`
    /// observation before it propagates.
    async fn load_module(
        &self,
        descriptor: &ModuleDescriptor,
    ) -> OrchestratorResult<Arc<dyn ProcessingModule>> {
        match self.try_load(descriptor).await {
            Ok(module) => Ok(module),
            Err(reason) => {
                error!("Failed to load module {}: {}", descriptor.id, reason);
                self.registry
                    .record_performance(
                        &descriptor.id,
                        PerformanceReport::failure("load_failure", reason.clone()),
                    )
                    .await;
                Err(OrchestratorError::LoadFailure {
                    module_id: descriptor.id.clone(),
                    reason,
                })
            }
        }
    }

    async fn try_load(
        &self,
        descriptor: &ModuleDescriptor,
    ) -> Result<Arc<dyn ProcessingModule>, String> {
        self.registry
            .verify_integrity(&descriptor.id)
            .await
            .map_err(|err| err.to_string())?;

        // A factory declaring the descriptor's id is the structural half of
        // the module contract; no factory means nothing can satisfy it.
        let Some(factory) = self.factories.get(&descriptor.id) else {
            return Err("no factory declares this module id".to_string());
        };
        factory.create().await.map_err(|err| err.to_string())
    }

    /// Remove an instance from the active set and run its cleanup.
    async fn unload_module(&self, state: &mut OrchestratorState, module_id: &str) {
        let Some(module) = state.active.remove(module_id) else {
            return;
        };
        if let Err(err) = module.cleanup().await {
            warn!("Cleanup of module {} failed: {}", module_id, err);
        }
        info!("Unloaded module: {}", module_id);
        self.emit(OrchestratorEvent::ModuleUnloaded {
            module_id: module_id.to_string(),
        });
    }

    /// Build a chain over the active instances in selection order.
    fn build_chain(&self, state: &OrchestratorState, selected: &[ModuleDescriptor]) -> ModuleChain {
        let mut chain = ModuleChain::new(self.registry.clone());
        for descriptor in selected {
            let Some(module) = state.active.get(&descriptor.id) else {
                continue;
            };
            let mut step = ChainStep::new(&descriptor.id, module.clone())
                .with_timeout(self.default_step_timeout);
            if let Some(config) = self.step_configs.get(&descriptor.id) {
                step = config.apply(step);
            }
            chain.add_step(step);
        }
        chain
    }

    fn run_metrics(
        state: &OrchestratorState,
        result: &ExecutionContext,
        latency_ms: f64,
    ) -> RuleMetrics {
        let mut active_modules: Vec<String> = state.active.keys().cloned().collect();
        active_modules.sort();
        RuleMetrics {
            latency_seconds: latency_ms / 1000.0,
            quality: result.get_f64("quality_score").unwrap_or(0.0),
            risk: result.get_f64("security_risk_score").unwrap_or(0.0),
            satisfaction: result.get_f64("user_satisfaction").unwrap_or(1.0),
            active_modules,
        }
    }

    fn escalate_mode(&self, state: &mut OrchestratorState, mode: OrchestrationMode, reason: &str) {
        warn!("Escalating orchestration mode to {}: {}", mode, reason);
        state.base_context.set("orchestration_mode", mode);
        self.emit(OrchestratorEvent::ModeEscalated { mode });
    }

    /// Apply one adaptation. `query` is the selection query of the request
    /// that produced it; the capability-layer adaptation re-runs it with the
    /// layer's feature set.
    async fn apply_adaptation(
        &self,
        state: &mut OrchestratorState,
        query: &SelectionContext,
        adaptation: Adaptation,
    ) -> OrchestratorResult<()> {
        match adaptation {
            Adaptation::SwapModule {
                old_id,
                new_id,
                reason,
            } => {
                info!("Swapping module {} -> {}: {}", old_id, new_id, reason);
                let descriptor = self
                    .registry
                    .get(&new_id)
                    .await
                    .ok_or_else(|| OrchestratorError::UnknownModule(new_id.clone()))?;
                self.unload_module(state, &old_id).await;
                let module = self.load_module(&descriptor).await?;
                state.active.insert(new_id.clone(), module);
                self.emit(OrchestratorEvent::ModuleSwapped { old_id, new_id });
            }
            Adaptation::EscalateMode { mode, reason } => {
                self.escalate_mode(state, mode, &reason);
            }
            Adaptation::AddCapabilityLayer { features, reason } => {
                info!("Adding capability layer {:?}: {}", features, reason);
                let layer_query = query.clone().with_features(features.clone());
                let selected = self.registry.select(&layer_query).await;

                let mut loaded = Vec::new();
                for descriptor in &selected {
                    if !state.active.contains_key(&descriptor.id) {
                        let module = self.load_module(descriptor).await?;
                        state.active.insert(descriptor.id.clone(), module);
                        info!("Loaded module: {}", descriptor.id);
                        self.emit(OrchestratorEvent::ModuleLoaded {
                            module_id: descriptor.id.clone(),
                        });
                        loaded.push(descriptor.id.clone());
                    }
                }
                self.emit(OrchestratorEvent::CapabilityLayerAdded { features, loaded });
            }
        }
        Ok(())
    }

    fn emit(&self, event: OrchestratorEvent) {
        // Best effort: no subscriber is fine.
        let _ = self.event_tx.send(event);
    }
}

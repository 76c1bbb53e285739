//! Modra runtime
//!
//! Execution on top of the registry: the fault-isolated module chain, the
//! adaptation rule engine, and the adaptive orchestrator that re-selects and
//! hot-swaps modules per request.
//!
//! ```rust,ignore
//! let orchestrator = AdaptiveOrchestrator::from_config_file("orchestrator.yaml")?
//!     .with_factory(Arc::new(ScanFactory));
//!
//! let result = orchestrator.process(request).await?;
//! ```

pub mod adaptation;
pub mod chain;
pub mod config;
pub mod error;
pub mod events;
pub mod monitor;
pub mod orchestrator;

pub use adaptation::{
    Adaptation, AdaptationRuleEngine, RuleMetrics, LATENCY_THRESHOLD_SECONDS, QUALITY_FLOOR,
    SATISFACTION_FLOOR, SECURITY_RISK_THRESHOLD,
};
pub use chain::{
    ChainState, ChainStep, ExecutionSummary, ModuleChain, StepErrorKind, StepSummary, StepTrace,
    DEFAULT_STEP_TIMEOUT,
};
pub use config::{ConfigError, ConfigResult, OrchestratorConfig, SwapPair};
pub use error::{ChainError, ChainResult, OrchestratorError, OrchestratorResult};
pub use events::OrchestratorEvent;
pub use monitor::{RunMonitor, RunOutcome, RunRecord};
pub use orchestrator::{AdaptiveOrchestrator, OrchestratorStatus, StepConfig};

//! Adaptive orchestration walkthrough
//!
//! Registers three modules, then drives the orchestrator through a healthy
//! request, a degraded one, and the adaptation fallout: the failing module's
//! error rate pushes it out of selection and low quality escalates the
//! orchestration mode.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use modra_kernel::{
    AgentKind, ExecutionContext, ModuleDescriptor, ModuleFactory, ModuleResult, ModuleStatus,
    OrchestrationMode, ProcessingModule, UserRole,
};
use modra_registry::{fingerprint_file, CapabilityRegistry};
use modra_runtime::{AdaptiveOrchestrator, StepConfig};

/// Summarizes the incoming request.
struct ContextScan;

#[async_trait]
impl ProcessingModule for ContextScan {
    async fn process(&self, input: ExecutionContext) -> ModuleResult<ExecutionContext> {
        let request = input.get_str("user_request").unwrap_or("(empty)");
        Ok(ExecutionContext::new()
            .with("scan_summary", format!("scanned: {request}"))
            .with("quality_score", 0.9))
    }
}

/// Drafts a plan; honors a `simulate_slow` flag so the demo can show a
/// step timeout.
struct DraftPlan;

#[async_trait]
impl ProcessingModule for DraftPlan {
    async fn process(&self, input: ExecutionContext) -> ModuleResult<ExecutionContext> {
        if input.get_bool("simulate_slow") == Some(true) {
            tokio::time::sleep(Duration::from_millis(150)).await;
        }
        Ok(ExecutionContext::new()
            .with("plan", "1. triage  2. fix  3. verify")
            .with("quality_score", 0.9))
    }
}

/// Reviews the run; marks quality low when earlier steps degraded.
struct RiskReview;

#[async_trait]
impl ProcessingModule for RiskReview {
    async fn process(&self, input: ExecutionContext) -> ModuleResult<ExecutionContext> {
        if input.get_bool("degraded_mode") == Some(true) {
            return Ok(ExecutionContext::new()
                .with("risk_note", "review ran against a degraded plan")
                .with("quality_score", 0.2));
        }
        Ok(ExecutionContext::new()
            .with("risk_note", "no findings")
            .with("quality_score", 0.95))
    }
}

macro_rules! demo_factory {
    ($factory:ident, $id:literal, $module:expr) => {
        struct $factory;

        #[async_trait]
        impl ModuleFactory for $factory {
            fn module_id(&self) -> &str {
                $id
            }

            async fn create(&self) -> ModuleResult<Arc<dyn ProcessingModule>> {
                Ok(Arc::new($module))
            }
        }
    };
}

demo_factory!(ScanFactory, "context_scan", ContextScan);
demo_factory!(PlanFactory, "draft_plan", DraftPlan);
demo_factory!(ReviewFactory, "risk_review", RiskReview);

async fn seed_registry(dir: &Path) -> Result<()> {
    let registry = CapabilityRegistry::open(dir.join("registry.yaml"))?;

    for (id, capability, status) in [
        ("context_scan", "scanning", ModuleStatus::Available),
        ("draft_plan", "planning", ModuleStatus::Available),
        ("risk_review", "risk_scoring", ModuleStatus::Critical),
    ] {
        let artifact = dir.join(format!("{id}.md"));
        std::fs::write(&artifact, format!("# {id}\ndemo module artifact\n"))?;
        let fingerprint = fingerprint_file(&artifact)?;

        let mut descriptor = ModuleDescriptor::new(id, id, "1.0.0")
            .with_artifact(&artifact, &fingerprint)
            .with_capability(capability)
            .with_kind(AgentKind::Orchestrator)
            .with_status(status)
            .with_approved_by("demo-operator")
            .with_effectiveness(0.9);
        for mode in [
            OrchestrationMode::Standard,
            OrchestrationMode::Critical,
            OrchestrationMode::Recovery,
        ] {
            descriptor = descriptor.with_mode(mode);
        }
        for role in [UserRole::Novice, UserRole::Expert, UserRole::Innovator] {
            descriptor = descriptor.with_role(role);
        }
        registry.register(descriptor).await?;
    }

    Ok(())
}

fn request(text: &str) -> ExecutionContext {
    ExecutionContext::new()
        .with("user_role", UserRole::Novice)
        .with("user_request", text)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("=== Modra adaptive orchestration demo ===");

    let dir = std::env::temp_dir().join("modra-demo");
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir)?;
    seed_registry(&dir).await?;

    // The orchestrator is wired from a config file, like a deployment would.
    let config_path = dir.join("orchestrator.yaml");
    std::fs::write(
        &config_path,
        format!(
            "registry_path: {}\nenvironment: demo\ncompliance_level: internal\n",
            dir.join("registry.yaml").display()
        ),
    )?;

    let orchestrator = AdaptiveOrchestrator::from_config_file(&config_path)?
        .with_factory(Arc::new(ScanFactory))
        .with_factory(Arc::new(PlanFactory))
        .with_factory(Arc::new(ReviewFactory))
        .with_step_config(
            "draft_plan",
            StepConfig::new().with_timeout(Duration::from_millis(50)),
        );
    let mut events = orchestrator.subscribe();

    info!("--- Request 1: healthy run ---");
    let result = orchestrator
        .process(request("summarize the incident report"))
        .await?;
    info!("plan: {}", result.get_str("plan").unwrap_or("(none)"));
    info!("risk: {}", result.get_str("risk_note").unwrap_or("(none)"));
    info!(
        "mode after request 1: {}",
        orchestrator.status().await.mode
    );

    info!("--- Request 2: the planner stalls past its step timeout ---");
    let result = orchestrator
        .process(request("summarize the incident report").with("simulate_slow", true))
        .await?;
    info!(
        "degraded: {:?}, failed step: {:?}",
        result.get_bool("degraded_mode"),
        result.get_u64("error_in_step")
    );
    info!("risk: {}", result.get_str("risk_note").unwrap_or("(none)"));
    info!(
        "mode after request 2: {}",
        orchestrator.status().await.mode
    );

    info!("--- Request 3: the failing planner is selected out ---");
    orchestrator
        .process(request("summarize the incident report"))
        .await?;
    info!(
        "active modules: {:?}",
        orchestrator.active_modules().await
    );

    info!("--- Final state ---");
    let status = orchestrator.status().await;
    info!("status: {}", serde_json::to_string_pretty(&status)?);

    let stats = orchestrator.registry().stats().await;
    info!(
        "registry: {} modules, {} observations",
        stats.total_modules, stats.performance_events
    );

    for record in orchestrator.monitor().history().await {
        info!("run: {:.1}ms, {:?}", record.latency_ms, record.outcome);
    }

    while let Ok(event) = events.try_recv() {
        info!("event: {event:?}");
    }

    Ok(())
}

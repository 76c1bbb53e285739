use std::collections::HashMap;
use std::time::Duration;

use anyhow::Result;

use modra_kernel::{ExecutionContext, OrchestrationMode, ProcessingModule};
use modra_registry::CapabilityRegistry;
use modra_runtime::{
    AdaptiveOrchestrator, ChainError, OrchestratorError, OrchestratorEvent, RunOutcome, StepConfig,
};
use modra_testing::fixtures::{base_context, request, selection_query};
use modra_testing::{MockFactory, MockModule, RegistryFixture};

fn orchestrator_over(fx: &RegistryFixture) -> AdaptiveOrchestrator {
    AdaptiveOrchestrator::new(fx.registry.clone(), base_context())
}

#[tokio::test]
async fn test_mock_module_counters() {
    let module = MockModule::new().with_output("done", true);

    assert_eq!(module.process_calls(), 0);
    let result = module.process(ExecutionContext::new()).await.unwrap();
    assert_eq!(result.get_bool("done"), Some(true));
    assert_eq!(module.process_calls(), 1);

    module.cleanup().await.unwrap();
    assert_eq!(module.cleanup_calls(), 1);
}

#[tokio::test]
async fn test_full_request_flow() -> Result<()> {
    let fx = RegistryFixture::new();
    fx.register(fx.descriptor("context_scan").with_capability("scanning"))
        .await;
    fx.register(fx.descriptor("draft_plan").with_capability("planning"))
        .await;

    let orchestrator = orchestrator_over(&fx)
        .with_factory(MockFactory::new(
            "context_scan",
            MockModule::new()
                .with_output("scan_summary", "two findings")
                .with_quality(0.9),
        ))
        .with_factory(MockFactory::new(
            "draft_plan",
            MockModule::new()
                .with_output("plan", "three actions")
                .with_quality(0.9),
        ));

    let result = orchestrator.process(request()).await?;

    // The full mutated context comes back, request keys included.
    assert_eq!(result.get_str("user_request"), Some("handle this"));
    assert_eq!(result.get_str("scan_summary"), Some("two findings"));
    assert_eq!(result.get_str("plan"), Some("three actions"));

    // A healthy run adapts nothing.
    let status = orchestrator.status().await;
    assert_eq!(status.mode, OrchestrationMode::Standard);
    assert_eq!(status.active_modules, vec!["context_scan", "draft_plan"]);

    // The registry saw one success per step, in step order.
    let log = fx.registry.performance_log().await;
    assert_eq!(log.len(), 2);
    assert_eq!(log[0].module_id, "context_scan");
    assert_eq!(log[0].metrics.step, Some(0));
    assert_eq!(log[1].module_id, "draft_plan");
    assert_eq!(log[1].metrics.step, Some(1));

    let stats = fx.registry.stats().await;
    assert_eq!(stats.total_modules, 2);
    assert_eq!(stats.total_usage, 2);
    assert_eq!(stats.performance_events, 2);

    // The snapshot was persisted at registration time.
    assert!(fx.snapshot_path().exists());

    let history = orchestrator.monitor().history().await;
    assert_eq!(history.len(), 1);
    assert!(matches!(
        history[0].outcome,
        RunOutcome::Completed { steps: 2, .. }
    ));
    Ok(())
}

#[tokio::test]
async fn test_hot_swap_convergence() {
    let fx = RegistryFixture::new();
    fx.register(fx.descriptor("alpha")).await;
    fx.register(fx.descriptor("beta")).await;

    let alpha_factory = MockFactory::new("alpha", MockModule::new().with_quality(0.9));
    let beta_factory = MockFactory::new("beta", MockModule::new().with_quality(0.9));
    let gamma_factory = MockFactory::new("gamma", MockModule::new().with_quality(0.9));
    let orchestrator = orchestrator_over(&fx)
        .with_factory(alpha_factory.clone())
        .with_factory(beta_factory.clone())
        .with_factory(gamma_factory.clone());

    orchestrator.process(request()).await.unwrap();
    assert_eq!(orchestrator.active_modules().await, vec!["alpha", "beta"]);

    // Alpha drops below the selection floor and gamma appears; the next
    // request must converge the active set to exactly {beta, gamma}.
    fx.register(fx.descriptor("alpha").with_effectiveness(0.2))
        .await;
    fx.register(fx.descriptor("gamma")).await;

    orchestrator.process(request()).await.unwrap();

    assert_eq!(orchestrator.active_modules().await, vec!["beta", "gamma"]);
    assert_eq!(alpha_factory.module().cleanup_calls(), 1);
    assert_eq!(gamma_factory.create_calls(), 1);
    // Beta was neither unloaded nor reloaded.
    assert_eq!(beta_factory.create_calls(), 1);
    assert_eq!(beta_factory.module().cleanup_calls(), 0);
}

#[tokio::test]
async fn test_degraded_continuation() {
    let fx = RegistryFixture::new();
    fx.register(fx.descriptor("fragile")).await;
    fx.register(fx.descriptor("steady")).await;

    let orchestrator = orchestrator_over(&fx)
        .with_factory(MockFactory::new(
            "fragile",
            MockModule::new().rejecting_input(),
        ))
        .with_factory(MockFactory::new(
            "steady",
            MockModule::new().with_output("after", "ran").with_quality(0.9),
        ));

    let result = orchestrator.process(request()).await.unwrap();

    modra_testing::assert_degraded!(result, 0);
    assert_eq!(result.get_str("after"), Some("ran"));

    // Degradation is not escalation; the mode is untouched.
    assert_eq!(
        orchestrator.status().await.mode,
        OrchestrationMode::Standard
    );

    // The failure is on the record, and only on fragile's record.
    let fragile = fx.registry.get("fragile").await.unwrap();
    assert_eq!(fragile.performance.error_rate, 1.0);
    assert_eq!(fragile.performance.usage_count, 1);
    let steady = fx.registry.get("steady").await.unwrap();
    assert_eq!(steady.performance.error_rate, 0.0);
}

#[tokio::test]
async fn test_critical_timeout_aborts_and_forces_recovery() {
    let fx = RegistryFixture::new();
    fx.register(
        fx.descriptor("risk_review")
            .with_status(modra_kernel::ModuleStatus::Critical),
    )
    .await;
    fx.register(fx.descriptor("writer")).await;

    let writer_factory = MockFactory::new(
        "writer",
        MockModule::new().with_output("written", true).with_quality(0.9),
    );
    let orchestrator = orchestrator_over(&fx)
        .with_factory(MockFactory::new(
            "risk_review",
            MockModule::new().with_delay(Duration::from_millis(200)),
        ))
        .with_factory(writer_factory.clone())
        .with_step_config(
            "risk_review",
            StepConfig::new().with_timeout(Duration::from_millis(50)),
        );

    let err = orchestrator
        .process(request().with("carried", "forward"))
        .await
        .unwrap_err();

    match err {
        OrchestratorError::Chain(ChainError::CriticalAbort { step, context, .. }) => {
            assert_eq!(step, 0);
            // Only state accumulated before the abort comes back.
            assert_eq!(context.get_str("carried"), Some("forward"));
            assert!(!context.contains_key("written"));
        }
        other => panic!("unexpected error: {other:?}"),
    }

    // The step after the abort never ran.
    assert_eq!(writer_factory.module().process_calls(), 0);

    // The failing call failed; the system is adapted for the next one.
    assert_eq!(
        orchestrator.status().await.mode,
        OrchestrationMode::Recovery
    );
    assert_eq!(orchestrator.monitor().failure_count().await, 1);

    let log = fx.registry.performance_log().await;
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].module_id, "risk_review");
    assert_eq!(log[0].metrics.error_kind.as_deref(), Some("timeout"));
}

#[tokio::test]
async fn test_mode_escalation_changes_selection() {
    let fx = RegistryFixture::new();
    let mut everyday = fx.descriptor("everyday");
    everyday.supported_modes = vec![OrchestrationMode::Standard];
    fx.register(everyday).await;
    fx.register(fx.descriptor("crisis_handler")).await;

    let everyday_factory = MockFactory::new(
        "everyday",
        MockModule::new().with_quality(0.2),
    );
    let orchestrator = orchestrator_over(&fx)
        .with_factory(everyday_factory.clone())
        .with_factory(MockFactory::new(
            "crisis_handler",
            MockModule::new().with_output("handled", true),
        ));

    // Low quality escalates to CRITICAL.
    orchestrator.process(request()).await.unwrap();
    assert_eq!(
        orchestrator.status().await.mode,
        OrchestrationMode::Critical
    );

    // In CRITICAL mode the standard-only module no longer qualifies; the
    // next request swaps it out.
    orchestrator.process(request()).await.unwrap();

    assert_eq!(
        orchestrator.active_modules().await,
        vec!["crisis_handler"]
    );
    assert_eq!(everyday_factory.module().cleanup_calls(), 1);
}

#[tokio::test]
async fn test_low_satisfaction_escalates_to_recovery() {
    let fx = RegistryFixture::new();
    fx.register(fx.descriptor("survey")).await;

    let orchestrator = orchestrator_over(&fx).with_factory(MockFactory::new(
        "survey",
        MockModule::new()
            .with_quality(0.9)
            .with_output("user_satisfaction", 0.1),
    ));

    orchestrator.process(request()).await.unwrap();
    assert_eq!(
        orchestrator.status().await.mode,
        OrchestrationMode::Recovery
    );
}

#[tokio::test]
async fn test_event_stream_observation() {
    let fx = RegistryFixture::new();
    fx.register(fx.descriptor("scan")).await;
    fx.register(fx.descriptor("plan")).await;

    let orchestrator = orchestrator_over(&fx)
        .with_factory(MockFactory::new(
            "scan",
            MockModule::new().with_quality(0.9),
        ))
        .with_factory(MockFactory::new(
            "plan",
            MockModule::new().with_quality(0.9),
        ));

    let mut events = orchestrator.subscribe();
    orchestrator.process(request()).await.unwrap();

    let mut loaded = Vec::new();
    let mut completed = 0;
    while let Ok(event) = events.try_recv() {
        match event {
            OrchestratorEvent::ModuleLoaded { module_id } => loaded.push(module_id),
            OrchestratorEvent::ChainCompleted { steps, .. } => {
                assert_eq!(steps, 2);
                completed += 1;
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
    assert_eq!(loaded, vec!["scan", "plan"]);
    assert_eq!(completed, 1);
}

#[tokio::test]
async fn test_dependency_closure_orders_steps() {
    let fx = RegistryFixture::new();
    fx.register(fx.descriptor("helper")).await;
    fx.register(
        fx.descriptor("leader")
            .with_dependency("helper")
            .with_effectiveness(0.95),
    )
    .await;

    let orchestrator = orchestrator_over(&fx)
        .with_factory(MockFactory::new(
            "helper",
            MockModule::new().with_quality(0.9),
        ))
        .with_factory(MockFactory::new(
            "leader",
            MockModule::new().with_quality(0.9),
        ));

    orchestrator.process(request()).await.unwrap();

    // Leader outranks helper, but its dependency runs first.
    let log = fx.registry.performance_log().await;
    assert_eq!(log[0].module_id, "helper");
    assert_eq!(log[0].metrics.step, Some(0));
    assert_eq!(log[1].module_id, "leader");
    assert_eq!(log[1].metrics.step, Some(1));
}

#[tokio::test]
async fn test_step_config_mappings_applied() {
    let fx = RegistryFixture::new();
    fx.register(fx.descriptor("translator")).await;

    let orchestrator = orchestrator_over(&fx)
        .with_factory(MockFactory::new(
            "translator",
            MockModule::new()
                .with_output("result", "bonjour")
                .with_quality(0.9),
        ))
        .with_step_config(
            "translator",
            StepConfig::new()
                .with_input_mapping(HashMap::from([(
                    "text".to_string(),
                    "user_request".to_string(),
                )]))
                .with_output_mapping(HashMap::from([(
                    "translated".to_string(),
                    "result".to_string(),
                )])),
        );

    let result = orchestrator.process(request()).await.unwrap();

    assert_eq!(result.get_str("translated"), Some("bonjour"));
    assert!(!result.contains_key("result"));
    assert_eq!(result.get_str("user_request"), Some("handle this"));
}

#[tokio::test]
async fn test_registry_survives_restart() -> Result<()> {
    let fx = RegistryFixture::new();
    fx.register(fx.descriptor("b_helper")).await;
    fx.register(
        fx.descriptor("a_leader")
            .with_dependency("b_helper")
            .with_capability("leading")
            .with_effectiveness(0.95),
    )
    .await;
    fx.register(
        fx.descriptor("c_rival")
            .with_conflict("a_leader")
            .with_effectiveness(0.92),
    )
    .await;

    // A fresh process opens the same snapshot.
    let reopened = CapabilityRegistry::open(fx.snapshot_path())?;

    let descriptor = reopened.get("a_leader").await.unwrap();
    assert!(descriptor.offers("leading"));
    assert_eq!(descriptor.performance.effectiveness, 0.95);

    let selected = reopened.select(&selection_query()).await;
    let ids: Vec<&str> = selected.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, vec!["b_helper", "a_leader"]);

    assert_eq!(reopened.stats().await.total_modules, 3);
    Ok(())
}

#[tokio::test]
async fn test_hand_edited_snapshot_loads() -> Result<()> {
    let fx = RegistryFixture::new();
    let artifact = fx.dir().join("handwritten.md");
    std::fs::write(&artifact, "hand-rolled module")?;
    let fingerprint = modra_registry::fingerprint_file(&artifact)?;

    let yaml = format!(
        r#"version: '1.0'
last_updated: 2026-08-24T00:00:00Z
modules:
- id: handwritten
  name: Handwritten
  version: 0.1.0
  artifact_path: {artifact}
  fingerprint: {fingerprint}
  capabilities: [triage]
  supported_kinds: [orchestrator]
  supported_modes: [STANDARD]
  supported_roles: [NOVICE]
  status: available
  audit_timestamp: 2026-08-24T00:00:00Z
  performance:
    effectiveness: 0.8
    usage_count: 0
    error_rate: 0.0
    avg_latency_ms: 0.0
    last_used: null
"#,
        artifact = artifact.display(),
        fingerprint = fingerprint,
    );
    let path = fx.dir().join("edited.yaml");
    std::fs::write(&path, yaml)?;

    let registry = CapabilityRegistry::open(&path)?;
    let selected = registry.select(&selection_query()).await;
    assert_eq!(selected.len(), 1);
    assert_eq!(selected[0].id, "handwritten");
    assert!(registry.verify_integrity("handwritten").await.is_ok());
    Ok(())
}

#[tokio::test]
async fn test_concurrent_requests_share_one_registry() {
    let fx = RegistryFixture::new();
    fx.register(fx.descriptor("shared_scan")).await;

    let first = orchestrator_over(&fx).with_factory(MockFactory::new(
        "shared_scan",
        MockModule::new().with_quality(0.9),
    ));
    let second = orchestrator_over(&fx).with_factory(MockFactory::new(
        "shared_scan",
        MockModule::new().with_quality(0.9),
    ));

    let (a, b) = tokio::join!(first.process(request()), second.process(request()));
    a.unwrap();
    b.unwrap();

    let stats = fx.registry.get("shared_scan").await.unwrap().performance;
    assert_eq!(stats.usage_count, 2);
    assert_eq!(fx.registry.performance_log().await.len(), 2);
}

#[tokio::test]
async fn test_failing_factory_reports_load_failure() {
    let fx = RegistryFixture::new();
    fx.register(fx.descriptor("broken")).await;

    let orchestrator =
        orchestrator_over(&fx).with_factory(modra_testing::FailingFactory::new("broken"));

    let err = orchestrator.process(request()).await.unwrap_err();
    assert!(matches!(
        err,
        OrchestratorError::LoadFailure { ref module_id, .. } if module_id == "broken"
    ));

    let log = fx.registry.performance_log().await;
    assert_eq!(log[0].metrics.error_kind.as_deref(), Some("load_failure"));
    assert!(log[0]
        .metrics
        .error_message
        .as_deref()
        .unwrap()
        .contains("refused to instantiate"));
}

//! Shared registry and context fixtures
//!
//! Every descriptor produced here is backed by a real artifact file in the
//! fixture's temp directory, so registration and load-time integrity checks
//! run for real. Setup failures panic; this crate only runs under tests.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;

use modra_kernel::{
    AgentKind, ExecutionContext, ModuleDescriptor, OrchestrationMode, SelectionContext, UserRole,
};
use modra_registry::{fingerprint_file, CapabilityRegistry};

/// A registry over a temp directory, plus the directory itself so artifacts
/// and the snapshot outlive the test body.
pub struct RegistryFixture {
    /// The registry under test.
    pub registry: Arc<CapabilityRegistry>,
    dir: TempDir,
}

impl Default for RegistryFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryFixture {
    /// Open a fresh registry in a fresh temp directory.
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let registry = Arc::new(
            CapabilityRegistry::open(dir.path().join("registry.yaml")).expect("open registry"),
        );
        Self { registry, dir }
    }

    /// Where the snapshot file lives.
    pub fn snapshot_path(&self) -> PathBuf {
        self.registry.snapshot_path().to_path_buf()
    }

    /// The fixture's temp directory.
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Build a descriptor with a real artifact and the widest support
    /// surface: every agent kind, mode, and role, effectiveness 0.9.
    ///
    /// Narrow the surface by reassigning the descriptor's public fields.
    pub fn descriptor(&self, id: &str) -> ModuleDescriptor {
        let artifact = self.dir.path().join(format!("{id}.md"));
        std::fs::write(&artifact, format!("artifact for {id}")).expect("write artifact");
        let fingerprint = fingerprint_file(&artifact).expect("fingerprint artifact");

        let mut descriptor = ModuleDescriptor::new(id, id, "1.0.0")
            .with_artifact(&artifact, &fingerprint)
            .with_effectiveness(0.9);
        for kind in [
            AgentKind::Orchestrator,
            AgentKind::Analyzer,
            AgentKind::Planner,
            AgentKind::Coder,
            AgentKind::Tester,
            AgentKind::Reviewer,
        ] {
            descriptor = descriptor.with_kind(kind);
        }
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
        descriptor
    }

    /// Register a descriptor, panicking on failure.
    pub async fn register(&self, descriptor: ModuleDescriptor) {
        self.registry.register(descriptor).await.expect("register");
    }
}

/// Base context an orchestrator under test starts from.
pub fn base_context() -> ExecutionContext {
    ExecutionContext::new()
        .with("agent_type", AgentKind::Orchestrator)
        .with("environment", "test")
        .with("compliance_level", "internal")
}

/// A well-formed request carrying the caller-side typed fields.
pub fn request() -> ExecutionContext {
    ExecutionContext::new()
        .with("user_role", UserRole::Novice)
        .with("user_request", "handle this")
}

/// A context carrying every field a selection query needs.
pub fn full_context() -> ExecutionContext {
    base_context()
        .with("orchestration_mode", OrchestrationMode::Standard)
        .with("user_role", UserRole::Novice)
}

/// The default query matching `full_context()`.
pub fn selection_query() -> SelectionContext {
    SelectionContext::new(
        AgentKind::Orchestrator,
        OrchestrationMode::Standard,
        UserRole::Novice,
    )
}

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

use gpu_stack_provisioner::resolver::{DependencyResolver, ResolvedAction};
use gpu_stack_provisioner::runtime::{
    BackoffStrategy, ComponentProbe, ContractRunner, ContractState, FileMarkerStore,
    FileProvenanceSink, InstallOutcome, MarkerStore, MemoryMarkerStore, MemoryProvenanceSink,
    ProbeError, ProbeRegistry, RetryPolicy,
};
use gpu_stack_provisioner::types::{
    ComponentKind, DriverRequest, InstallMarker, MarkerStatus, RuntimeRequest, SourceFields,
    StackSpec,
};

/// Simulated state of one component on the target host
#[derive(Debug, Default)]
struct HostState {
    installed: Option<String>,
    functional: bool,
    install_calls: u32,
    repair_calls: u32,
    transient_failures: u32,
    needs_reboot: bool,
    broken_after_install: bool,
}

#[derive(Clone)]
struct FakeProbe {
    kind: ComponentKind,
    version: String,
    host: Arc<Mutex<HostState>>,
}

impl FakeProbe {
    fn new(kind: ComponentKind, version: &str) -> Self {
        Self {
            kind,
            version: version.to_string(),
            host: Arc::new(Mutex::new(HostState::default())),
        }
    }

    fn with_state(self, update: impl FnOnce(&mut HostState)) -> Self {
        update(&mut self.host.lock().unwrap());
        self
    }

    fn install_calls(&self) -> u32 {
        self.host.lock().unwrap().install_calls
    }
}

#[async_trait]
impl ComponentProbe for FakeProbe {
    fn kind(&self) -> ComponentKind {
        self.kind
    }

    async fn detect(&self, _action: &ResolvedAction) -> Result<Option<String>, ProbeError> {
        Ok(self.host.lock().unwrap().installed.clone())
    }

    async fn functional(&self, _action: &ResolvedAction) -> Result<bool, ProbeError> {
        Ok(self.host.lock().unwrap().functional)
    }

    async fn install(
        &self,
        _action: &ResolvedAction,
        repair: bool,
    ) -> Result<InstallOutcome, ProbeError> {
        let mut host = self.host.lock().unwrap();
        host.install_calls += 1;
        if repair {
            host.repair_calls += 1;
        }
        if host.transient_failures > 0 {
            host.transient_failures -= 1;
            return Err(ProbeError::Transient {
                kind: self.kind,
                reason: "repository signature not yet valid".to_string(),
            });
        }
        if host.needs_reboot {
            return Ok(InstallOutcome::RebootRequired);
        }
        host.installed = Some(self.version.clone());
        host.functional = !host.broken_after_install;
        Ok(InstallOutcome::Completed)
    }

    async fn verify(&self, _action: &ResolvedAction) -> Result<String, ProbeError> {
        let host = self.host.lock().unwrap();
        match (&host.installed, host.functional) {
            (Some(version), true) => Ok(version.clone()),
            _ => Err(ProbeError::Fatal {
                kind: self.kind,
                reason: "daemon does not answer version query".to_string(),
            }),
        }
    }
}

fn runtime_action(version: Option<&str>) -> ResolvedAction {
    let mut request = RuntimeRequest::new("containerd");
    if let Some(version) = version {
        request = request.with_version(version);
    }
    DependencyResolver::new()
        .resolve(&StackSpec::new().with_container_runtime(request))
        .unwrap()
        .remove(0)
}

fn driver_action() -> ResolvedAction {
    let spec = StackSpec::new().with_driver(
        DriverRequest::new().with_sources(SourceFields::package(Some("550.54.15"))),
    );
    DependencyResolver::new().resolve(&spec).unwrap().remove(0)
}

fn quick_retry(attempts: u32) -> RetryPolicy {
    RetryPolicy::new(attempts, Duration::from_millis(1), BackoffStrategy::Linear)
}

struct Harness {
    runner: ContractRunner,
    markers: Arc<MemoryMarkerStore>,
    provenance: Arc<MemoryProvenanceSink>,
}

fn harness(probe: FakeProbe) -> Harness {
    harness_with_markers(probe, MemoryMarkerStore::new())
}

fn harness_with_markers(probe: FakeProbe, markers: MemoryMarkerStore) -> Harness {
    let markers = Arc::new(markers);
    let provenance = Arc::new(MemoryProvenanceSink::new());
    let runner = ContractRunner::new(
        ProbeRegistry::new().with_probe(Box::new(probe)),
        markers.clone(),
        provenance.clone(),
    )
    .with_retry(quick_retry(3));
    Harness {
        runner,
        markers,
        provenance,
    }
}

#[tokio::test]
async fn test_second_run_is_already_satisfied_without_side_effects() {
    let probe = FakeProbe::new(ComponentKind::ContainerRuntime, "1.7.20");
    let h = harness(probe.clone());
    let action = runtime_action(Some("1.7.20"));

    let first = h.runner.execute(&action).await;
    assert_eq!(first.state, ContractState::Installed);
    assert_eq!(first.version.as_deref(), Some("1.7.20"));
    assert_eq!(
        first.history,
        vec![
            ContractState::Unknown,
            ContractState::Checking,
            ContractState::NeedsInstall,
            ContractState::Installing,
            ContractState::Verifying,
            ContractState::Installed,
        ]
    );

    let writes = h.markers.write_count();
    let second = h.runner.execute(&action).await;

    assert_eq!(second.state, ContractState::AlreadySatisfied);
    assert_eq!(probe.install_calls(), 1);
    assert_eq!(h.markers.write_count(), writes);
    assert_eq!(h.provenance.records().len(), 1);
}

#[tokio::test]
async fn test_unset_version_accepts_whatever_is_installed() {
    let probe = FakeProbe::new(ComponentKind::ContainerRuntime, "2.0.0").with_state(|s| {
        s.installed = Some("1.6.33".to_string());
        s.functional = true;
    });
    let h = harness(probe.clone());

    let outcome = h.runner.execute(&runtime_action(None)).await;
    assert_eq!(outcome.state, ContractState::AlreadySatisfied);
    assert_eq!(outcome.version.as_deref(), Some("1.6.33"));
    assert_eq!(probe.install_calls(), 0);
    assert_eq!(h.markers.write_count(), 0);
    assert!(h.provenance.records().is_empty());
}

#[tokio::test]
async fn test_present_but_broken_is_repaired() {
    let probe = FakeProbe::new(ComponentKind::ContainerRuntime, "1.7.20").with_state(|s| {
        s.installed = Some("1.7.20".to_string());
        s.functional = false;
    });
    let h = harness(probe.clone());

    let outcome = h.runner.execute(&runtime_action(Some("v1.7.20"))).await;
    assert_eq!(outcome.state, ContractState::Installed);
    assert!(outcome.history.contains(&ContractState::NeedsRepair));
    assert_eq!(probe.host.lock().unwrap().repair_calls, 1);
}

#[tokio::test]
async fn test_version_mismatch_reinstalls() {
    let probe = FakeProbe::new(ComponentKind::ContainerRuntime, "1.7.20").with_state(|s| {
        s.installed = Some("1.6.33".to_string());
        s.functional = true;
    });
    let h = harness(probe.clone());

    let outcome = h.runner.execute(&runtime_action(Some("1.7.20"))).await;
    assert_eq!(outcome.state, ContractState::Installed);
    assert!(outcome.history.contains(&ContractState::NeedsInstall));
    assert_eq!(probe.host.lock().unwrap().repair_calls, 0);
}

#[tokio::test]
async fn test_transient_install_failures_are_retried() {
    let probe = FakeProbe::new(ComponentKind::ContainerRuntime, "1.7.20")
        .with_state(|s| s.transient_failures = 2);
    let h = harness(probe.clone());

    let outcome = h.runner.execute(&runtime_action(None)).await;
    assert_eq!(outcome.state, ContractState::Installed);
    assert_eq!(probe.install_calls(), 3);
}

#[tokio::test]
async fn test_exhausted_retries_fail_the_action() {
    let probe = FakeProbe::new(ComponentKind::ContainerRuntime, "1.7.20")
        .with_state(|s| s.transient_failures = 10);
    let h = harness(probe.clone());

    let outcome = h.runner.execute(&runtime_action(None)).await;
    assert_eq!(outcome.state, ContractState::Failed);
    assert_eq!(probe.install_calls(), 3);
    assert!(outcome.error.unwrap().contains("repository signature"));
    assert!(h.markers.get(ComponentKind::ContainerRuntime).is_none());
}

#[tokio::test]
async fn test_verification_failure_is_terminal() {
    let probe = FakeProbe::new(ComponentKind::ContainerRuntime, "1.7.20")
        .with_state(|s| s.broken_after_install = true);
    let h = harness(probe);

    let outcome = h.runner.execute(&runtime_action(None)).await;
    assert_eq!(outcome.state, ContractState::Failed);
    assert_eq!(outcome.history[outcome.history.len() - 2], ContractState::Verifying);
    assert!(h.provenance.records().is_empty());
    assert!(h.markers.get(ComponentKind::ContainerRuntime).is_none());
}

#[tokio::test]
async fn test_driver_reboot_is_pending_and_not_reinstalled() {
    let probe = FakeProbe::new(ComponentKind::Driver, "550.54.15")
        .with_state(|s| s.needs_reboot = true);
    let h = harness(probe.clone());
    let action = driver_action();

    let first = h.runner.execute(&action).await;
    assert_eq!(first.state, ContractState::PendingReboot);
    assert!(first.state.halts_pipeline());
    let marker = h.markers.get(ComponentKind::Driver).unwrap();
    assert!(marker.is_pending_reboot());
    assert_eq!(marker.version.as_deref(), Some("550.54.15"));

    let second = h.runner.execute(&action).await;
    assert_eq!(second.state, ContractState::PendingReboot);
    assert_eq!(
        second.history,
        vec![
            ContractState::Unknown,
            ContractState::Checking,
            ContractState::PendingReboot
        ]
    );
    assert_eq!(probe.install_calls(), 1);

    // The host came back up with the new driver loaded
    {
        let mut host = probe.host.lock().unwrap();
        host.installed = Some("550.54.15".to_string());
        host.functional = true;
    }
    let third = h.runner.execute(&action).await;
    assert_eq!(third.state, ContractState::AlreadySatisfied);
    assert_eq!(
        h.markers.get(ComponentKind::Driver).map(|m| m.status),
        Some(MarkerStatus::Installed)
    );
    let records = h.provenance.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].kind, ComponentKind::Driver);
    assert_eq!(records[0].version.as_deref(), Some("550.54.15"));

    // Nothing left to upgrade on the next run
    let fourth = h.runner.execute(&action).await;
    assert_eq!(fourth.state, ContractState::AlreadySatisfied);
    assert_eq!(h.provenance.records().len(), 1);
    assert_eq!(probe.install_calls(), 1);
}

#[tokio::test]
async fn test_loaded_but_unusable_driver_waits_for_reboot() {
    // Package install finished, the new module is not loaded yet
    let probe = FakeProbe::new(ComponentKind::Driver, "550.54.15").with_state(|s| {
        s.installed = Some("550.54.15".to_string());
        s.functional = false;
    });
    let markers = MemoryMarkerStore::new().with_marker(InstallMarker::pending_reboot(
        ComponentKind::Driver,
        Some("550.54.15".to_string()),
    ));
    let h = harness_with_markers(probe.clone(), markers);

    let outcome = h.runner.execute(&driver_action()).await;
    assert_eq!(outcome.state, ContractState::PendingReboot);
    assert_eq!(
        outcome.history,
        vec![
            ContractState::Unknown,
            ContractState::Checking,
            ContractState::PendingReboot
        ]
    );
    assert_eq!(probe.install_calls(), 0);
    assert_eq!(h.markers.write_count(), 0);
    assert!(h.markers.get(ComponentKind::Driver).unwrap().is_pending_reboot());
}

#[tokio::test]
async fn test_runtime_cannot_request_reboot() {
    let probe = FakeProbe::new(ComponentKind::ContainerRuntime, "1.7.20")
        .with_state(|s| s.needs_reboot = true);
    let h = harness(probe);

    let outcome = h.runner.execute(&runtime_action(None)).await;
    assert_eq!(outcome.state, ContractState::Failed);
}

#[tokio::test]
async fn test_missing_probe_fails() {
    let h = harness(FakeProbe::new(ComponentKind::Kernel, "6.8.0"));
    let outcome = h.runner.execute(&driver_action()).await;
    assert_eq!(outcome.state, ContractState::Failed);
    assert!(outcome.error.unwrap().contains("No probe registered"));
}

#[tokio::test]
async fn test_file_backed_markers_survive_runner_restart() {
    let dir = TempDir::new().unwrap();
    let probe = FakeProbe::new(ComponentKind::Driver, "550.54.15")
        .with_state(|s| s.needs_reboot = true);

    let build = |probe: FakeProbe| {
        ContractRunner::new(
            ProbeRegistry::new().with_probe(Box::new(probe)),
            Arc::new(FileMarkerStore::new(dir.path())),
            Arc::new(FileProvenanceSink::new(dir.path())),
        )
        .with_retry(quick_retry(1))
    };

    let first = build(probe.clone()).execute(&driver_action()).await;
    assert_eq!(first.state, ContractState::PendingReboot);

    let second = build(probe.clone()).execute(&driver_action()).await;
    assert_eq!(second.state, ContractState::PendingReboot);
    assert_eq!(probe.install_calls(), 1);

    let marker = FileMarkerStore::new(dir.path())
        .load(ComponentKind::Driver)
        .await
        .unwrap();
    assert_eq!(
        marker,
        InstallMarker::pending_reboot(ComponentKind::Driver, Some("550.54.15".to_string()))
    );
}

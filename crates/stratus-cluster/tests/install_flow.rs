//! End-to-end lifecycle flows against the in-memory store and
//! simulated collaborators.

use std::sync::Arc;

use stratus_cluster::sim::{
    CallRecorder, Fault, SimCloudClient, SimClusterClientFactory, SimCredentialRefresher,
    SimDiagnostics, SimFleetClient,
};
use stratus_cluster::{
    ClusterDocument, ClusterError, ClusterManager, ClusterStore, InstallPhase, MaintenanceTask,
    MemoryClusterStore,
};
use stratus_steps::{CollectingEmitter, Runner, SimulatedClock};

struct Harness {
    manager: ClusterManager,
    recorder: Arc<CallRecorder>,
    metrics: Arc<CollectingEmitter>,
    store: Arc<MemoryClusterStore>,
}

async fn harness(doc: ClusterDocument) -> Harness {
    let store = Arc::new(MemoryClusterStore::new());
    store.put(doc).await.unwrap();

    let recorder = CallRecorder::new();
    let metrics = Arc::new(CollectingEmitter::new());
    let manager = ClusterManager::new(
        store.clone(),
        SimCloudClient::new(recorder.clone()),
        SimFleetClient::new(recorder.clone()),
        SimClusterClientFactory::new(recorder.clone()),
        SimCredentialRefresher::new(recorder.clone()),
    )
    .with_metrics(metrics.clone())
    .with_diagnostics(SimDiagnostics::new(recorder.clone()))
    .with_runner(Runner::new().with_clock(Arc::new(SimulatedClock::new())));

    Harness {
        manager,
        recorder,
        metrics,
        store,
    }
}

fn demo_doc() -> ClusterDocument {
    let mut doc = ClusterDocument::new("demo", "clusters/demo");
    doc.properties.cluster_profile.version = "4.10.3".to_string();
    doc
}

async fn persisted_phase(store: &MemoryClusterStore) -> Option<u8> {
    store
        .get("clusters/demo")
        .await
        .unwrap()
        .properties
        .install
        .map(|i| i.phase)
}

#[tokio::test]
async fn test_install_advances_phase_and_resumes() {
    let h = harness(demo_doc()).await;

    // First invocation runs the bootstrap phase and persists the
    // advance to the next one
    h.manager.install("clusters/demo").await.unwrap();
    assert_eq!(
        persisted_phase(&h.store).await,
        Some(u8::from(InstallPhase::RemoveBootstrap))
    );
    assert!(h.recorder.was_called("create_dns"));
    assert!(h.recorder.was_called("run_direct_installer"));
    assert!(!h.recorder.was_called("remove_bootstrap"));

    // Second invocation executes only the removal phase
    h.manager.install("clusters/demo").await.unwrap();
    assert!(h.recorder.was_called("remove_bootstrap"));
    assert_eq!(h.recorder.count("create_dns"), 1);
    assert_eq!(persisted_phase(&h.store).await, None);
}

#[tokio::test]
async fn test_failed_bootstrap_leaves_phase_for_retry() {
    let h = harness(demo_doc()).await;
    h.recorder.fail_times("create_dns", Fault::Execution, 1);

    let err = h.manager.install("clusters/demo").await.unwrap_err();
    let ClusterError::Run(run_err) = err else {
        panic!("expected run error");
    };
    assert_eq!(run_err.step, "create_dns");
    assert!(h.recorder.was_called("gather_failure_logs"));
    assert!(!h.recorder.was_called("run_direct_installer"));
    // Still in the bootstrap phase; no success metrics emitted
    assert_eq!(
        persisted_phase(&h.store).await,
        Some(u8::from(InstallPhase::Bootstrap))
    );
    assert!(h.metrics.gauges().is_empty());

    // Outer retry re-invokes the whole operation, which resumes and
    // completes the phase
    h.manager.install("clusters/demo").await.unwrap();
    assert_eq!(
        persisted_phase(&h.store).await,
        Some(u8::from(InstallPhase::RemoveBootstrap))
    );
}

#[tokio::test]
async fn test_install_via_fleet_delegates_provisioning() {
    let mut doc = demo_doc();
    doc.properties.install_via_fleet = true;
    let h = harness(doc).await;

    h.manager.install("clusters/demo").await.unwrap();

    assert!(h.recorder.was_called("fleet_create_namespace"));
    assert!(h.recorder.was_called("fleet_run_installer"));
    assert!(h.recorder.was_called("fleet_reset_correlation_data"));
    assert!(!h.recorder.was_called("run_direct_installer"));
}

#[tokio::test]
async fn test_authorization_retry_within_install() {
    let h = harness(demo_doc()).await;
    h.recorder
        .fail_times("validate_resources", Fault::AuthorizationPending, 2);

    h.manager.install("clusters/demo").await.unwrap();

    assert_eq!(h.recorder.count("validate_resources"), 3);
    assert_eq!(h.recorder.count("refresh_credential"), 2);
}

#[tokio::test]
async fn test_install_emits_per_step_and_total_gauges() {
    let h = harness(demo_doc()).await;

    h.manager.install("clusters/demo").await.unwrap();

    assert!(h
        .metrics
        .value_of("backend.cluster.install.create_dns.duration.seconds")
        .is_some());
    assert!(h
        .metrics
        .value_of("backend.cluster.install.duration.total.seconds")
        .is_some());
}

#[tokio::test]
async fn test_update_flow_rotates_credentials() {
    let h = harness(demo_doc()).await;

    h.manager.update("clusters/demo").await.unwrap();

    assert!(h.recorder.was_called("rotate_registry_token"));
    assert!(h.recorder.was_called("restart_addon_controller"));
    assert!(!h.recorder.was_called("fleet_ensure_resources"));
    assert!(h
        .metrics
        .value_of("backend.cluster.update.duration.total.seconds")
        .is_some());
}

#[tokio::test]
async fn test_admin_update_full_task_records_marker() {
    let mut doc = demo_doc();
    doc.properties.maintenance_task = MaintenanceTask::Everything;
    let h = harness(doc).await;

    h.manager.admin_update("clusters/demo").await.unwrap();

    assert!(h.recorder.was_called("ensure_addon"));
    let marker = h
        .store
        .get("clusters/demo")
        .await
        .unwrap()
        .properties
        .provisioned_by;
    assert!(marker.is_some());
}

#[tokio::test]
async fn test_admin_update_partial_task_never_writes_marker() {
    let mut doc = demo_doc();
    doc.properties.maintenance_task = MaintenanceTask::RenewCerts;
    let h = harness(doc).await;

    h.manager.admin_update("clusters/demo").await.unwrap();

    let marker = h
        .store
        .get("clusters/demo")
        .await
        .unwrap()
        .properties
        .provisioned_by;
    assert!(marker.is_none());
}

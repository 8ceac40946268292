//! Cluster lifecycle manager
//!
//! Entry points for the three lifecycle operations. Each invocation
//! loads the document, assembles the step list for the current state,
//! and hands it to the runner. On success the per-step and total
//! durations are reported as gauges under the invocation's topic; on
//! failure diagnostics are gathered best-effort and the step error is
//! returned to the caller, who owns user-visible status and outer
//! retry. A failed install resumes from the persisted phase on the
//! next invocation.

use std::sync::Arc;

use chrono::Utc;
use stratus_steps::{CredentialRefresher, MetricsEmitter, NoopEmitter, Runner, Step};
use tracing::{error, info, warn};

use crate::clients::{CloudClient, ClusterClientFactory, FleetClient};
use crate::context::ClusterContext;
use crate::diagnostics::{DiagnosticsCollector, DIAGNOSTICS_TIMEOUT};
use crate::document::{Install, InstallPhase};
use crate::error::{ClusterError, Result};
use crate::store::ClusterStore;
use crate::{admin, install, update};

pub struct ClusterManager {
    store: Arc<dyn ClusterStore>,
    cloud: Arc<dyn CloudClient>,
    fleet: Arc<dyn FleetClient>,
    cluster_factory: Arc<dyn ClusterClientFactory>,
    refresher: Arc<dyn CredentialRefresher>,
    metrics: Arc<dyn MetricsEmitter>,
    diagnostics: Option<Arc<dyn DiagnosticsCollector>>,
    runner: Runner,
}

impl ClusterManager {
    pub fn new(
        store: Arc<dyn ClusterStore>,
        cloud: Arc<dyn CloudClient>,
        fleet: Arc<dyn FleetClient>,
        cluster_factory: Arc<dyn ClusterClientFactory>,
        refresher: Arc<dyn CredentialRefresher>,
    ) -> Self {
        Self {
            store,
            cloud,
            fleet,
            cluster_factory,
            refresher,
            metrics: Arc::new(NoopEmitter),
            diagnostics: None,
            runner: Runner::new(),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsEmitter>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_diagnostics(mut self, diagnostics: Arc<dyn DiagnosticsCollector>) -> Self {
        self.diagnostics = Some(diagnostics);
        self
    }

    /// Replace the runner, e.g. to wire in a shutdown signal or a
    /// simulated clock
    pub fn with_runner(mut self, runner: Runner) -> Self {
        self.runner = runner;
        self
    }

    /// Run the install phase the document currently points at. A
    /// fresh document gets its installation state initialized first;
    /// an unrecognised persisted phase is a configuration error
    /// reported before any step executes.
    pub async fn install(&self, key: &str) -> Result<()> {
        let doc = self.store.get(key).await?;
        let ctx = self.new_context(doc);

        self.start_installation(&ctx).await?;

        let doc = ctx.doc().await;
        let raw_phase = doc
            .properties
            .install
            .as_ref()
            .ok_or(ClusterError::InstallNotStarted)?
            .phase;
        let phase =
            InstallPhase::try_from(raw_phase).map_err(ClusterError::UnknownPhase)?;

        info!(cluster = %doc.id, ?phase, "starting install phase");
        let steps = install::installation_steps(phase, &doc, &self.refresher);
        self.run_steps(ctx, &steps, "install").await
    }

    /// Run the credential-rotation update flow
    pub async fn update(&self, key: &str) -> Result<()> {
        let doc = self.store.get(key).await?;
        info!(cluster = %doc.id, "starting update");
        let steps = update::update_steps(&doc, &self.refresher);
        let ctx = self.new_context(doc);
        self.run_steps(ctx, &steps, "update").await
    }

    /// Run the maintenance flow selected by the document's
    /// maintenance task
    pub async fn admin_update(&self, key: &str) -> Result<()> {
        let doc = self.store.get(key).await?;
        info!(cluster = %doc.id, task = ?doc.properties.maintenance_task, "starting admin update");
        let steps = admin::admin_update_steps(&doc, &self.refresher);
        let ctx = self.new_context(doc);
        self.run_steps(ctx, &steps, "adminUpdate").await
    }

    fn new_context(&self, doc: crate::document::ClusterDocument) -> Arc<ClusterContext> {
        ClusterContext::new(
            doc,
            self.store.clone(),
            self.cloud.clone(),
            self.fleet.clone(),
            self.cluster_factory.clone(),
        )
    }

    /// Ensure the document carries installation state. The recorded
    /// start time also seeds the time-limited token the bootstrap
    /// machine uses to fetch its ignition payload, so it is set only
    /// once.
    async fn start_installation(&self, ctx: &ClusterContext) -> Result<()> {
        ctx.patch(Box::new(|doc| {
            if doc.properties.install.is_none() {
                doc.properties.install = Some(Install::new(Utc::now()));
            }
            Ok(())
        }))
        .await?;
        Ok(())
    }

    async fn run_steps(
        &self,
        ctx: Arc<ClusterContext>,
        steps: &[Step<ClusterContext>],
        topic: &str,
    ) -> Result<()> {
        match self.runner.run(ctx, steps).await {
            Ok(durations) => {
                let mut total = 0i64;
                for (step, duration) in &durations {
                    let seconds = duration.as_secs() as i64;
                    self.metrics.emit_gauge(
                        &format!("backend.cluster.{topic}.{step}.duration.seconds"),
                        seconds,
                        None,
                    );
                    total += seconds;
                }
                self.metrics.emit_gauge(
                    &format!("backend.cluster.{topic}.duration.total.seconds"),
                    total,
                    None,
                );
                Ok(())
            }
            Err(err) => {
                error!(topic = %topic, step = %err.step, error = %err.source, "run failed");
                self.gather_failure_logs().await;
                Err(ClusterError::Run(err))
            }
        }
    }

    /// Best-effort log capture after a failed run. Bounded by a hard
    /// timeout; its own failures are logged and swallowed so they can
    /// never mask the run's terminal error.
    async fn gather_failure_logs(&self) {
        let Some(diagnostics) = &self.diagnostics else {
            return;
        };
        match tokio::time::timeout(DIAGNOSTICS_TIMEOUT, diagnostics.gather_failure_logs()).await
        {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(error = %err, "failure log collection failed"),
            Err(_) => warn!("failure log collection timed out"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{ClusterDocument, MaintenanceTask};
    use crate::sim::{
        CallRecorder, Fault, SimCloudClient, SimClusterClientFactory, SimCredentialRefresher,
        SimDiagnostics, SimFleetClient,
    };
    use crate::store::MemoryClusterStore;
    use stratus_steps::{CollectingEmitter, SimulatedClock};

    struct Fixture {
        manager: ClusterManager,
        recorder: Arc<CallRecorder>,
        metrics: Arc<CollectingEmitter>,
        store: Arc<MemoryClusterStore>,
    }

    async fn fixture(doc: ClusterDocument) -> Fixture {
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

        Fixture {
            manager,
            recorder,
            metrics,
            store,
        }
    }

    #[tokio::test]
    async fn test_admin_update_emits_metrics_on_success() {
        let mut doc = ClusterDocument::new("demo", "clusters/demo");
        doc.properties.maintenance_task = MaintenanceTask::RenewCerts;
        let f = fixture(doc).await;

        f.manager.admin_update("clusters/demo").await.unwrap();

        assert!(f.recorder.was_called("configure_api_server_certificate"));
        assert!(!f.recorder.was_called("gather_failure_logs"));
        assert!(f
            .metrics
            .value_of("backend.cluster.adminUpdate.start_vms.duration.seconds")
            .is_some());
        assert!(f
            .metrics
            .value_of("backend.cluster.adminUpdate.duration.total.seconds")
            .is_some());
    }

    #[tokio::test]
    async fn test_failed_run_skips_metrics_and_gathers_logs() {
        let mut doc = ClusterDocument::new("demo", "clusters/demo");
        doc.properties.maintenance_task = MaintenanceTask::RenewCerts;
        let f = fixture(doc).await;
        f.recorder
            .fail_always("configure_ingress_certificate", Fault::Execution);

        let err = f.manager.admin_update("clusters/demo").await.unwrap_err();

        let ClusterError::Run(run_err) = err else {
            panic!("expected run error");
        };
        assert_eq!(run_err.step, "configure_ingress_certificate");
        assert!(f.recorder.was_called("gather_failure_logs"));
        // No success gauges for a failed run
        assert!(f.metrics.gauges().is_empty());
    }

    #[tokio::test]
    async fn test_diagnostics_failure_never_masks_run_error() {
        let mut doc = ClusterDocument::new("demo", "clusters/demo");
        doc.properties.maintenance_task = MaintenanceTask::RenewCerts;
        let f = fixture(doc).await;
        f.recorder.fail_always("start_vms", Fault::Execution);
        f.recorder.fail_always("gather_failure_logs", Fault::Execution);

        let err = f.manager.admin_update("clusters/demo").await.unwrap_err();

        let ClusterError::Run(run_err) = err else {
            panic!("expected run error");
        };
        assert_eq!(run_err.step, "start_vms");
        assert!(f.recorder.was_called("gather_failure_logs"));
    }

    #[tokio::test]
    async fn test_unknown_phase_is_fatal_before_any_step() {
        let mut doc = ClusterDocument::new("demo", "clusters/demo");
        doc.properties.install = Some(Install::new(Utc::now()));
        doc.properties.install.as_mut().unwrap().phase = 7;
        let f = fixture(doc).await;

        let err = f.manager.install("clusters/demo").await.unwrap_err();

        assert!(matches!(err, ClusterError::UnknownPhase(7)));
        assert!(f.recorder.calls().is_empty());
    }

    #[tokio::test]
    async fn test_install_sets_start_time_once() {
        let f = fixture(ClusterDocument::new("demo", "clusters/demo")).await;

        f.manager.install("clusters/demo").await.unwrap();
        let first = f.store.get("clusters/demo").await.unwrap();
        let started = first.properties.install.as_ref().unwrap().now;

        f.manager.install("clusters/demo").await.unwrap();
        let second = f.store.get("clusters/demo").await.unwrap();
        // Install completed; state cleared by finish_installation
        assert!(second.properties.install.is_none());
        assert!(started <= Utc::now());
    }
}

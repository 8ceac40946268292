//! Cluster health monitor
//!
//! Deliberately a different execution policy from the lifecycle
//! runner: the runner aborts on the first failure because later steps
//! depend on earlier ones, while the monitor runs every probe and
//! aggregates every error, because the probes are independent and a
//! partial health picture is better than none. The two policies are
//! kept separate on purpose; unifying them would silently change
//! failure semantics for one of the call sites.

use std::collections::HashMap;
use std::sync::Arc;

use stratus_steps::{MetricsEmitter, StepError};
use tracing::{info, warn};

use crate::clients::ClusterClient;

/// Gauge emitted once per probe that could not be gathered
pub const MONITOR_FAILURE_METRIC: &str = "monitor.cluster.failures";

/// One probe that failed during a monitor pass
#[derive(Debug)]
pub struct ProbeFailure {
    pub probe: String,
    pub error: StepError,
}

pub struct ClusterMonitor {
    cluster: Arc<dyn ClusterClient>,
    metrics: Arc<dyn MetricsEmitter>,
}

impl ClusterMonitor {
    pub fn new(cluster: Arc<dyn ClusterClient>, metrics: Arc<dyn MetricsEmitter>) -> Self {
        Self { cluster, metrics }
    }

    /// One monitoring pass. The API health probe runs first: when the
    /// API is unreachable the remaining probes would all fail for the
    /// same root cause, so they are skipped. Otherwise every probe
    /// runs; failures are collected and metered, never aborted on.
    pub async fn check(&self) -> Vec<ProbeFailure> {
        let mut failures = Vec::new();

        match self.cluster.api_servers_ready().await {
            Ok(true) => {}
            Ok(false) => {
                self.record(&mut failures, "api_servers_ready",
                    StepError::Execution("api servers not ready".to_string()));
                return failures;
            }
            Err(err) => {
                self.record(&mut failures, "api_servers_ready", err);
                // Distinguish an unhealthy API from an unreachable one
                if let Err(err) = self.cluster.ping().await {
                    self.record(&mut failures, "ping", err);
                }
                return failures;
            }
        }

        self.probe(&mut failures, "cluster_version_ready", self.cluster.cluster_version_ready().await);
        self.probe(&mut failures, "minimum_worker_nodes_ready", self.cluster.minimum_worker_nodes_ready().await);
        self.probe(&mut failures, "console_ready", self.cluster.console_ready().await);
        self.probe(&mut failures, "ingress_controller_ready", self.cluster.ingress_controller_ready().await);
        self.probe(&mut failures, "addon_deployment_ready", self.cluster.addon_deployment_ready().await);

        if failures.is_empty() {
            info!("monitor pass clean");
        }
        failures
    }

    fn probe(
        &self,
        failures: &mut Vec<ProbeFailure>,
        name: &str,
        result: Result<bool, StepError>,
    ) {
        if let Err(err) = result {
            self.record(failures, name, err);
        }
    }

    fn record(&self, failures: &mut Vec<ProbeFailure>, probe: &str, error: StepError) {
        warn!(probe = %probe, error = %error, "failed to gather probe");
        let mut dims = HashMap::new();
        dims.insert("probe".to_string(), probe.to_string());
        self.metrics.emit_gauge(MONITOR_FAILURE_METRIC, 1, Some(&dims));
        failures.push(ProbeFailure {
            probe: probe.to_string(),
            error,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{CallRecorder, Fault, SimClusterClient};
    use stratus_steps::CollectingEmitter;

    fn monitor(recorder: &Arc<CallRecorder>) -> (ClusterMonitor, Arc<CollectingEmitter>) {
        let metrics = Arc::new(CollectingEmitter::new());
        (
            ClusterMonitor::new(SimClusterClient::new(recorder.clone()), metrics.clone()),
            metrics,
        )
    }

    #[tokio::test]
    async fn test_clean_pass() {
        let recorder = CallRecorder::new();
        let (monitor, metrics) = monitor(&recorder);

        let failures = monitor.check().await;

        assert!(failures.is_empty());
        assert!(metrics.gauges().is_empty());
        assert!(recorder.was_called("ingress_controller_ready"));
    }

    #[tokio::test]
    async fn test_collects_all_failures_without_aborting() {
        let recorder = CallRecorder::new();
        recorder.fail_always("cluster_version_ready", Fault::Execution);
        recorder.fail_always("console_ready", Fault::Execution);
        let (monitor, metrics) = monitor(&recorder);

        let failures = monitor.check().await;

        // Both failures collected, and later probes still ran
        assert_eq!(failures.len(), 2);
        assert!(recorder.was_called("addon_deployment_ready"));
        assert_eq!(metrics.count_of(MONITOR_FAILURE_METRIC), 2);
    }

    #[tokio::test]
    async fn test_unreachable_api_short_circuits() {
        let recorder = CallRecorder::new();
        recorder.never_ready("api_servers_ready");
        let (monitor, _metrics) = monitor(&recorder);

        let failures = monitor.check().await;

        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].probe, "api_servers_ready");
        assert!(!recorder.was_called("cluster_version_ready"));
    }

    #[tokio::test]
    async fn test_probe_error_falls_back_to_ping() {
        let recorder = CallRecorder::new();
        recorder.fail_always("api_servers_ready", Fault::Execution);
        recorder.fail_always("ping", Fault::Execution);
        let (monitor, metrics) = monitor(&recorder);

        let failures = monitor.check().await;

        assert_eq!(failures.len(), 2);
        assert_eq!(failures[1].probe, "ping");
        assert_eq!(metrics.count_of(MONITOR_FAILURE_METRIC), 2);
    }
}

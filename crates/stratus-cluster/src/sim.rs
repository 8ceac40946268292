//! Simulated collaborators for tests and the dev harness
//!
//! A shared [`CallRecorder`] captures every operation invocation in
//! order and replays scripted outcomes, so tests can assert on
//! sequencing and inject failures without real cloud or cluster
//! endpoints. The same doubles drive the CLI demo.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use stratus_steps::{Credential, CredentialRefresher, StepError};

use crate::clients::{CloudClient, ClusterClient, ClusterClientFactory, FleetClient};
use crate::diagnostics::DiagnosticsCollector;
use crate::document::ClusterDocument;

/// Failure classification a script can inject
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    Execution,
    AuthorizationPending,
}

impl Fault {
    fn to_error(self, op: &str) -> StepError {
        match self {
            Fault::Execution => StepError::Execution(format!("{op} failed")),
            Fault::AuthorizationPending => {
                StepError::AuthorizationPending(format!("{op}: role assignment not propagated"))
            }
        }
    }
}

#[derive(Debug)]
enum Script {
    FailTimes { fault: Fault, remaining: usize },
    FailAlways(Fault),
    NotReadyTimes(usize),
    NeverReady,
}

/// Shared invocation log plus scripted outcomes, keyed by operation
/// name. Unscripted actions succeed; unscripted probes report ready.
#[derive(Debug, Default)]
pub struct CallRecorder {
    calls: Mutex<Vec<String>>,
    scripts: Mutex<HashMap<String, Script>>,
}

impl CallRecorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Fail the operation's next `times` invocations
    pub fn fail_times(&self, op: &str, fault: Fault, times: usize) {
        self.scripts
            .lock()
            .unwrap()
            .insert(op.to_string(), Script::FailTimes { fault, remaining: times });
    }

    /// Fail every invocation of the operation
    pub fn fail_always(&self, op: &str, fault: Fault) {
        self.scripts
            .lock()
            .unwrap()
            .insert(op.to_string(), Script::FailAlways(fault));
    }

    /// Report not-ready for the probe's next `times` invocations
    pub fn not_ready_times(&self, op: &str, times: usize) {
        self.scripts
            .lock()
            .unwrap()
            .insert(op.to_string(), Script::NotReadyTimes(times));
    }

    /// Report not-ready for every invocation of the probe
    pub fn never_ready(&self, op: &str) {
        self.scripts
            .lock()
            .unwrap()
            .insert(op.to_string(), Script::NeverReady);
    }

    /// All invocations so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of invocations of one operation
    pub fn count(&self, op: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == op).count()
    }

    pub fn was_called(&self, op: &str) -> bool {
        self.count(op) > 0
    }

    fn action(&self, op: &str) -> Result<(), StepError> {
        self.calls.lock().unwrap().push(op.to_string());
        let mut scripts = self.scripts.lock().unwrap();
        match scripts.get_mut(op) {
            Some(Script::FailAlways(fault)) => Err(fault.to_error(op)),
            Some(Script::FailTimes { fault, remaining }) if *remaining > 0 => {
                *remaining -= 1;
                Err(fault.to_error(op))
            }
            _ => Ok(()),
        }
    }

    fn probe(&self, op: &str) -> Result<bool, StepError> {
        self.calls.lock().unwrap().push(op.to_string());
        let mut scripts = self.scripts.lock().unwrap();
        match scripts.get_mut(op) {
            Some(Script::NeverReady) => Ok(false),
            Some(Script::NotReadyTimes(remaining)) if *remaining > 0 => {
                *remaining -= 1;
                Ok(false)
            }
            Some(Script::FailAlways(fault)) => Err(fault.to_error(op)),
            Some(Script::FailTimes { fault, remaining }) if *remaining > 0 => {
                *remaining -= 1;
                Err(fault.to_error(op))
            }
            _ => Ok(true),
        }
    }
}

// Generates a whole trait impl delegating every method to the shared
// recorder, so scripted outcomes apply uniformly.
macro_rules! sim_client {
    ($trait:ident for $ty:ident {
        actions: [$($action:ident),* $(,)?],
        probes: [$($probe:ident),* $(,)?] $(,)?
    }) => {
        #[async_trait]
        impl $trait for $ty {
            $(
                async fn $action(&self) -> Result<(), StepError> {
                    self.recorder.action(stringify!($action))
                }
            )*
            $(
                async fn $probe(&self) -> Result<bool, StepError> {
                    self.recorder.probe(stringify!($probe))
                }
            )*
        }
    };
}

/// Cloud control plane double
pub struct SimCloudClient {
    recorder: Arc<CallRecorder>,
}

impl SimCloudClient {
    pub fn new(recorder: Arc<CallRecorder>) -> Arc<Self> {
        Arc::new(Self { recorder })
    }
}

sim_client!(CloudClient for SimCloudClient {
    actions: [
        validate_resources,
        ensure_registry_token,
        ensure_infra_id,
        ensure_ssh_key,
        ensure_storage_suffix,
        create_dns,
        initialize_service_principal_clients,
        resolve_service_principal_object_id,
        ensure_resource_group,
        ensure_service_endpoints,
        set_master_subnet_policies,
        deploy_base_resource_template,
        update_api_ip,
        create_or_update_router_ip,
        ensure_gateway,
        create_api_server_private_endpoint,
        create_certificates,
        run_direct_installer,
        generate_kubeconfigs,
        ensure_billing_record,
        start_vms,
        create_or_update_service_principal_rbac,
        create_or_update_deny_assignment,
        rotate_registry_token,
        reconcile_load_balancer_profile,
        ensure_defaults,
        fixup_service_principal_object_id,
        fix_infra_id,
        migrate_storage_accounts,
        fix_ssh,
        fix_sre_kubeconfig,
        fix_user_admin_kubeconfig,
        ensure_gateway_upgrade,
        ensure_mtu_size,
    ],
    probes: [attach_nsgs],
});

/// In-cluster API double
pub struct SimClusterClient {
    recorder: Arc<CallRecorder>,
}

impl SimClusterClient {
    pub fn new(recorder: Arc<CallRecorder>) -> Arc<Self> {
        Arc::new(Self { recorder })
    }
}

sim_client!(ClusterClient for SimClusterClient {
    actions: [
        ping,
        remove_bootstrap,
        remove_bootstrap_ignition,
        configure_api_server_certificate,
        configure_ingress_certificate,
        renew_telemetry_certificate,
        update_console_branding,
        disable_samples,
        disable_marketplace_sources,
        disable_updates,
        configure_default_storage_class,
        initialize_addon_deployer,
        ensure_addon,
        ensure_credentials_request,
        update_platform_secret,
        update_addon_secret,
        restart_addon_controller,
        update_cluster_data,
    ],
    probes: [
        api_servers_ready,
        minimum_worker_nodes_ready,
        console_exists,
        console_ready,
        cluster_version_ready,
        addon_deployment_ready,
        addon_running_desired_version,
        ingress_controller_ready,
        credentials_request_reconciled,
    ],
});

/// Factory double; records the initialization and hands out a cluster
/// client sharing the same recorder.
pub struct SimClusterClientFactory {
    recorder: Arc<CallRecorder>,
}

impl SimClusterClientFactory {
    pub fn new(recorder: Arc<CallRecorder>) -> Arc<Self> {
        Arc::new(Self { recorder })
    }
}

#[async_trait]
impl ClusterClientFactory for SimClusterClientFactory {
    async fn new_cluster_client(
        &self,
        _doc: &ClusterDocument,
    ) -> Result<Arc<dyn ClusterClient>, StepError> {
        self.recorder.action("new_cluster_client")?;
        Ok(SimClusterClient::new(self.recorder.clone()))
    }
}

/// Fleet service double
pub struct SimFleetClient {
    recorder: Arc<CallRecorder>,
}

impl SimFleetClient {
    pub fn new(recorder: Arc<CallRecorder>) -> Arc<Self> {
        Arc::new(Self { recorder })
    }
}

#[async_trait]
impl FleetClient for SimFleetClient {
    async fn create_namespace(&self) -> Result<(), StepError> {
        self.recorder.action("fleet_create_namespace")
    }

    async fn ensure_resources(&self) -> Result<(), StepError> {
        self.recorder.action("fleet_ensure_resources")
    }

    async fn run_installer(&self) -> Result<(), StepError> {
        self.recorder.action("fleet_run_installer")
    }

    async fn installation_complete(&self) -> Result<bool, StepError> {
        self.recorder.probe("fleet_installation_complete")
    }

    async fn deployment_ready(&self) -> Result<bool, StepError> {
        self.recorder.probe("fleet_deployment_ready")
    }

    async fn reset_correlation_data(&self) -> Result<(), StepError> {
        self.recorder.action("fleet_reset_correlation_data")
    }
}

/// Credential source double
pub struct SimCredentialRefresher {
    recorder: Arc<CallRecorder>,
}

impl SimCredentialRefresher {
    pub fn new(recorder: Arc<CallRecorder>) -> Arc<Self> {
        Arc::new(Self { recorder })
    }
}

#[async_trait]
impl CredentialRefresher for SimCredentialRefresher {
    async fn refresh(&self) -> Result<Credential, StepError> {
        self.recorder.action("refresh_credential")?;
        Ok(Credential::new("sim-token"))
    }
}

/// Diagnostics double
pub struct SimDiagnostics {
    recorder: Arc<CallRecorder>,
}

impl SimDiagnostics {
    pub fn new(recorder: Arc<CallRecorder>) -> Arc<Self> {
        Arc::new(Self { recorder })
    }
}

#[async_trait]
impl DiagnosticsCollector for SimDiagnostics {
    async fn gather_failure_logs(&self) -> Result<(), StepError> {
        self.recorder.action("gather_failure_logs")
    }
}

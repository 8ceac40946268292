//! Collaborator interfaces called by step bodies
//!
//! Step bodies only ever see these traits; the real cloud-platform,
//! in-cluster, and fleet-service implementations live with their
//! respective transports and are out of scope here. Simulated
//! implementations for tests and the dev harness are in [`crate::sim`].

use std::sync::Arc;

use async_trait::async_trait;
use stratus_steps::StepError;

use crate::document::ClusterDocument;

/// Cloud-platform control plane operations.
///
/// Actions return `Err(StepError::AuthorizationPending)` when blocked
/// on IAM propagation; the runner's retrying steps key off that
/// classification.
#[async_trait]
pub trait CloudClient: Send + Sync {
    async fn validate_resources(&self) -> Result<(), StepError>;
    async fn ensure_registry_token(&self) -> Result<(), StepError>;
    async fn ensure_infra_id(&self) -> Result<(), StepError>;
    async fn ensure_ssh_key(&self) -> Result<(), StepError>;
    async fn ensure_storage_suffix(&self) -> Result<(), StepError>;
    async fn create_dns(&self) -> Result<(), StepError>;
    async fn initialize_service_principal_clients(&self) -> Result<(), StepError>;
    async fn resolve_service_principal_object_id(&self) -> Result<(), StepError>;
    async fn ensure_resource_group(&self) -> Result<(), StepError>;
    async fn ensure_service_endpoints(&self) -> Result<(), StepError>;
    async fn set_master_subnet_policies(&self) -> Result<(), StepError>;
    async fn deploy_base_resource_template(&self) -> Result<(), StepError>;

    /// True once the network security groups are attached to all
    /// cluster subnets
    async fn attach_nsgs(&self) -> Result<bool, StepError>;

    async fn update_api_ip(&self) -> Result<(), StepError>;
    async fn create_or_update_router_ip(&self) -> Result<(), StepError>;
    async fn ensure_gateway(&self) -> Result<(), StepError>;
    async fn create_api_server_private_endpoint(&self) -> Result<(), StepError>;
    async fn create_certificates(&self) -> Result<(), StepError>;
    async fn run_direct_installer(&self) -> Result<(), StepError>;
    async fn generate_kubeconfigs(&self) -> Result<(), StepError>;
    async fn ensure_billing_record(&self) -> Result<(), StepError>;
    async fn start_vms(&self) -> Result<(), StepError>;
    async fn create_or_update_service_principal_rbac(&self) -> Result<(), StepError>;
    async fn create_or_update_deny_assignment(&self) -> Result<(), StepError>;
    async fn rotate_registry_token(&self) -> Result<(), StepError>;
    async fn reconcile_load_balancer_profile(&self) -> Result<(), StepError>;
    async fn ensure_defaults(&self) -> Result<(), StepError>;
    async fn fixup_service_principal_object_id(&self) -> Result<(), StepError>;
    async fn fix_infra_id(&self) -> Result<(), StepError>;
    async fn migrate_storage_accounts(&self) -> Result<(), StepError>;
    async fn fix_ssh(&self) -> Result<(), StepError>;
    async fn fix_sre_kubeconfig(&self) -> Result<(), StepError>;
    async fn fix_user_admin_kubeconfig(&self) -> Result<(), StepError>;
    async fn ensure_gateway_upgrade(&self) -> Result<(), StepError>;
    async fn ensure_mtu_size(&self) -> Result<(), StepError>;
}

/// In-cluster API operations, available only after the
/// initialize-cluster-clients step has run.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Cheap reachability check, used by the monitor to distinguish
    /// an unhealthy API from an unreachable one
    async fn ping(&self) -> Result<(), StepError>;

    async fn api_servers_ready(&self) -> Result<bool, StepError>;
    async fn minimum_worker_nodes_ready(&self) -> Result<bool, StepError>;
    async fn console_exists(&self) -> Result<bool, StepError>;
    async fn console_ready(&self) -> Result<bool, StepError>;
    async fn cluster_version_ready(&self) -> Result<bool, StepError>;
    async fn addon_deployment_ready(&self) -> Result<bool, StepError>;
    async fn addon_running_desired_version(&self) -> Result<bool, StepError>;
    async fn ingress_controller_ready(&self) -> Result<bool, StepError>;
    async fn credentials_request_reconciled(&self) -> Result<bool, StepError>;

    async fn remove_bootstrap(&self) -> Result<(), StepError>;
    async fn remove_bootstrap_ignition(&self) -> Result<(), StepError>;
    async fn configure_api_server_certificate(&self) -> Result<(), StepError>;
    async fn configure_ingress_certificate(&self) -> Result<(), StepError>;
    async fn renew_telemetry_certificate(&self) -> Result<(), StepError>;
    async fn update_console_branding(&self) -> Result<(), StepError>;
    async fn disable_samples(&self) -> Result<(), StepError>;
    async fn disable_marketplace_sources(&self) -> Result<(), StepError>;
    async fn disable_updates(&self) -> Result<(), StepError>;
    async fn configure_default_storage_class(&self) -> Result<(), StepError>;
    async fn initialize_addon_deployer(&self) -> Result<(), StepError>;
    async fn ensure_addon(&self) -> Result<(), StepError>;
    async fn ensure_credentials_request(&self) -> Result<(), StepError>;
    async fn update_platform_secret(&self) -> Result<(), StepError>;
    async fn update_addon_secret(&self) -> Result<(), StepError>;
    async fn restart_addon_controller(&self) -> Result<(), StepError>;
    async fn update_cluster_data(&self) -> Result<(), StepError>;
}

/// Builds the in-cluster client once the cluster API exists. Invoked
/// by the initialize-cluster-clients step, never at context
/// construction, because during bootstrap there is no cluster yet.
#[async_trait]
pub trait ClusterClientFactory: Send + Sync {
    async fn new_cluster_client(
        &self,
        doc: &ClusterDocument,
    ) -> Result<Arc<dyn ClusterClient>, StepError>;
}

/// Fleet reconciliation service operations
#[async_trait]
pub trait FleetClient: Send + Sync {
    async fn create_namespace(&self) -> Result<(), StepError>;
    async fn ensure_resources(&self) -> Result<(), StepError>;
    async fn run_installer(&self) -> Result<(), StepError>;
    async fn installation_complete(&self) -> Result<bool, StepError>;
    async fn deployment_ready(&self) -> Result<bool, StepError>;
    async fn reset_correlation_data(&self) -> Result<(), StepError>;
}

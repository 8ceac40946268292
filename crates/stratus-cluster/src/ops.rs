//! Step bodies for the lifecycle workflows
//!
//! Free async functions over [`ClusterContext`], referenced by name
//! from the workflow assemblers. Most delegate to a collaborator
//! client; the document-mutating ones go through the context's
//! lease-guarded patch.

use std::sync::Arc;

use stratus_steps::StepError;

use crate::context::ClusterContext;
use crate::error::ClusterError;

/// Release marker written by a completed full admin update
pub const PROVISIONED_BY: &str = concat!("stratus/", env!("CARGO_PKG_VERSION"));

macro_rules! cloud_actions {
    ($($name:ident),* $(,)?) => {$(
        pub async fn $name(ctx: Arc<ClusterContext>) -> Result<(), StepError> {
            ctx.cloud().$name().await
        }
    )*};
}

macro_rules! cluster_actions {
    ($($name:ident),* $(,)?) => {$(
        pub async fn $name(ctx: Arc<ClusterContext>) -> Result<(), StepError> {
            ctx.cluster()?.$name().await
        }
    )*};
}

macro_rules! cluster_probes {
    ($($name:ident),* $(,)?) => {$(
        pub async fn $name(ctx: Arc<ClusterContext>) -> Result<bool, StepError> {
            ctx.cluster()?.$name().await
        }
    )*};
}

macro_rules! fleet_ops {
    (actions: [$($a_name:ident => $a_method:ident),* $(,)?],
     probes: [$($p_name:ident => $p_method:ident),* $(,)?] $(,)?) => {
        $(
            pub async fn $a_name(ctx: Arc<ClusterContext>) -> Result<(), StepError> {
                ctx.fleet().$a_method().await
            }
        )*
        $(
            pub async fn $p_name(ctx: Arc<ClusterContext>) -> Result<bool, StepError> {
                ctx.fleet().$p_method().await
            }
        )*
    };
}

cloud_actions![
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
];

pub async fn attach_nsgs(ctx: Arc<ClusterContext>) -> Result<bool, StepError> {
    ctx.cloud().attach_nsgs().await
}

/// Builds the in-cluster API clients used by every later step of the
/// flow; must precede any of the `cluster_*` bodies.
pub async fn initialize_cluster_clients(ctx: Arc<ClusterContext>) -> Result<(), StepError> {
    ctx.initialize_cluster_clients().await
}

cluster_actions![
    initialize_addon_deployer,
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
    ensure_addon,
    ensure_credentials_request,
    update_platform_secret,
    update_addon_secret,
    restart_addon_controller,
    update_cluster_data,
];

cluster_probes![
    api_servers_ready,
    minimum_worker_nodes_ready,
    console_exists,
    console_ready,
    cluster_version_ready,
    addon_deployment_ready,
    addon_running_desired_version,
    ingress_controller_ready,
    credentials_request_reconciled,
];

fleet_ops! {
    actions: [
        fleet_create_namespace => create_namespace,
        fleet_ensure_resources => ensure_resources,
        run_fleet_installer => run_installer,
        fleet_reset_correlation_data => reset_correlation_data,
    ],
    probes: [
        fleet_installation_complete => installation_complete,
        fleet_deployment_ready => deployment_ready,
    ],
}

/// Advance the persisted install phase by one
pub async fn increment_install_phase(ctx: Arc<ClusterContext>) -> Result<(), StepError> {
    ctx.patch(Box::new(|doc| {
        let install = doc
            .properties
            .install
            .as_mut()
            .ok_or(ClusterError::InstallNotStarted)?;
        install.phase += 1;
        Ok(())
    }))
    .await?;
    Ok(())
}

/// Clear the in-progress installation state; the terminal step of the
/// final phase
pub async fn finish_installation(ctx: Arc<ClusterContext>) -> Result<(), StepError> {
    ctx.patch(Box::new(|doc| {
        doc.properties.install = None;
        Ok(())
    }))
    .await?;
    Ok(())
}

/// Record the release that performed this admin update. External
/// maintenance tooling reads the marker to detect a fully updated
/// cluster, so only the full maintenance task may run this step.
pub async fn update_provisioned_by(ctx: Arc<ClusterContext>) -> Result<(), StepError> {
    ctx.patch(Box::new(|doc| {
        doc.properties.provisioned_by = Some(PROVISIONED_BY.to_string());
        Ok(())
    }))
    .await?;
    Ok(())
}

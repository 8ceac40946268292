//! Installation workflow assembly
//!
//! Step lists are built fresh per invocation from the document
//! snapshot, indexed by the persisted install phase. The bootstrap
//! list branches on the installation mode: direct provisioning versus
//! delegation to the fleet installation service, and fresh install
//! versus adoption into fleet reconciliation. Both paths converge on a
//! common tail that ends by advancing the persisted phase, which is
//! what lets a restarted process resume at the next phase.

use std::sync::Arc;
use std::time::Duration;

use stratus_steps::{CredentialRefresher, Step};

use crate::context::ClusterContext;
use crate::document::{ClusterDocument, InstallPhase};
use crate::ops;

const fn minutes(m: u64) -> Duration {
    Duration::from_secs(m * 60)
}

/// The step list for one install phase
pub fn installation_steps(
    phase: InstallPhase,
    doc: &ClusterDocument,
    refresher: &Arc<dyn CredentialRefresher>,
) -> Vec<Step<ClusterContext>> {
    match phase {
        InstallPhase::Bootstrap => bootstrap_steps(doc, refresher),
        InstallPhase::RemoveBootstrap => remove_bootstrap_steps(),
    }
}

/// Phase one: provision the cloud resources and run the installer
pub fn bootstrap_steps(
    doc: &ClusterDocument,
    refresher: &Arc<dyn CredentialRefresher>,
) -> Vec<Step<ClusterContext>> {
    let mut steps = vec![
        Step::retrying_action("validate_resources", refresher.clone(), ops::validate_resources),
        Step::action("ensure_registry_token", ops::ensure_registry_token),
        Step::action("ensure_infra_id", ops::ensure_infra_id),
        Step::action("ensure_ssh_key", ops::ensure_ssh_key),
        Step::action("ensure_storage_suffix", ops::ensure_storage_suffix),
        Step::action("create_dns", ops::create_dns),
        // Must run before the object id can be resolved
        Step::action(
            "initialize_service_principal_clients",
            ops::initialize_service_principal_clients,
        ),
        Step::retrying_action(
            "resolve_service_principal_object_id",
            refresher.clone(),
            ops::resolve_service_principal_object_id,
        ),
        Step::action("ensure_resource_group", ops::ensure_resource_group),
        Step::action("ensure_service_endpoints", ops::ensure_service_endpoints),
        Step::action("set_master_subnet_policies", ops::set_master_subnet_policies),
        Step::retrying_action(
            "deploy_base_resource_template",
            refresher.clone(),
            ops::deploy_base_resource_template,
        ),
        Step::condition("attach_nsgs", ops::attach_nsgs, minutes(3), true),
        Step::action("update_api_ip", ops::update_api_ip),
        Step::action("create_or_update_router_ip", ops::create_or_update_router_ip),
        Step::action("ensure_gateway", ops::ensure_gateway),
        Step::action(
            "create_api_server_private_endpoint",
            ops::create_api_server_private_endpoint,
        ),
        Step::action("create_certificates", ops::create_certificates),
    ];

    if doc.fleet_involved() {
        steps.push(Step::action("fleet_create_namespace", ops::fleet_create_namespace));
    }

    if doc.properties.install_via_fleet {
        steps.extend([
            Step::action("run_fleet_installer", ops::run_fleet_installer),
            Step::condition(
                "fleet_installation_complete",
                ops::fleet_installation_complete,
                minutes(60),
                true,
            ),
            Step::condition(
                "fleet_deployment_ready",
                ops::fleet_deployment_ready,
                minutes(5),
                true,
            ),
            Step::action("generate_kubeconfigs", ops::generate_kubeconfigs),
        ]);
    } else {
        steps.extend([
            Step::action("run_direct_installer", ops::run_direct_installer),
            Step::action("generate_kubeconfigs", ops::generate_kubeconfigs),
        ]);
        if doc.properties.adopt_via_fleet {
            steps.extend([
                Step::action("fleet_ensure_resources", ops::fleet_ensure_resources),
                Step::condition(
                    "fleet_deployment_ready",
                    ops::fleet_deployment_ready,
                    minutes(5),
                    true,
                ),
            ]);
        }
    }

    if doc.fleet_involved() {
        steps.push(Step::action(
            "fleet_reset_correlation_data",
            ops::fleet_reset_correlation_data,
        ));
    }

    steps.extend([
        Step::action("ensure_billing_record", ops::ensure_billing_record),
        Step::action("initialize_cluster_clients", ops::initialize_cluster_clients),
        Step::action("initialize_addon_deployer", ops::initialize_addon_deployer),
        Step::condition("api_servers_ready", ops::api_servers_ready, minutes(30), true),
        Step::action("ensure_addon", ops::ensure_addon),
        Step::action("increment_install_phase", ops::increment_install_phase),
    ]);

    steps
}

/// Phase two: retire the bootstrap machine and finish cluster
/// configuration
pub fn remove_bootstrap_steps() -> Vec<Step<ClusterContext>> {
    vec![
        Step::action("initialize_cluster_clients", ops::initialize_cluster_clients),
        Step::action("initialize_addon_deployer", ops::initialize_addon_deployer),
        Step::action("remove_bootstrap", ops::remove_bootstrap),
        Step::action("remove_bootstrap_ignition", ops::remove_bootstrap_ignition),
        Step::condition("api_servers_ready", ops::api_servers_ready, minutes(30), true),
        Step::action(
            "configure_api_server_certificate",
            ops::configure_api_server_certificate,
        ),
        // The certificate rollout restarts the API servers; wait for
        // them to settle again before proceeding
        Step::condition(
            "api_servers_ready_post_certificate",
            ops::api_servers_ready,
            minutes(30),
            true,
        ),
        Step::condition(
            "minimum_worker_nodes_ready",
            ops::minimum_worker_nodes_ready,
            minutes(30),
            true,
        ),
        Step::condition("console_exists", ops::console_exists, minutes(30), true),
        Step::action("update_console_branding", ops::update_console_branding),
        Step::condition("console_ready", ops::console_ready, minutes(20), true),
        Step::action("disable_samples", ops::disable_samples),
        Step::action("disable_marketplace_sources", ops::disable_marketplace_sources),
        Step::action("disable_updates", ops::disable_updates),
        Step::condition(
            "cluster_version_ready",
            ops::cluster_version_ready,
            minutes(30),
            true,
        ),
        Step::condition(
            "addon_deployment_ready",
            ops::addon_deployment_ready,
            minutes(20),
            true,
        ),
        Step::action("update_cluster_data", ops::update_cluster_data),
        Step::action(
            "configure_ingress_certificate",
            ops::configure_ingress_certificate,
        ),
        Step::condition(
            "ingress_controller_ready",
            ops::ingress_controller_ready,
            minutes(30),
            true,
        ),
        Step::action(
            "configure_default_storage_class",
            ops::configure_default_storage_class,
        ),
        Step::action("finish_installation", ops::finish_installation),
    ]
}

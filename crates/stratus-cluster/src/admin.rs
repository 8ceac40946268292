//! Admin-update workflow assembly
//!
//! The step set is composed from shared blocks according to the
//! document's maintenance task. The zeroth block always runs; the
//! provisioned-by marker step runs only for the full task, and last,
//! because external maintenance tooling reads that marker as "this
//! cluster has been fully admin-updated". A partial task writing it
//! would be a false positive in that detector.

use std::sync::Arc;
use std::time::Duration;

use stratus_steps::{CredentialRefresher, Step};

use crate::context::ClusterContext;
use crate::document::{ClusterDocument, MaintenanceTask};
use crate::ops;
use crate::version::should_update_addon;

const fn minutes(m: u64) -> Duration {
    Duration::from_secs(m * 60)
}

pub fn admin_update_steps(
    doc: &ClusterDocument,
    refresher: &Arc<dyn CredentialRefresher>,
) -> Vec<Step<ClusterContext>> {
    let task = doc.properties.maintenance_task;
    let mut steps = zeroth_steps(refresher);

    match task {
        MaintenanceTask::Everything => {
            steps.extend(general_fixes_steps());
            steps.extend(certificate_renewal_steps());
            if should_update_addon(&doc.properties.cluster_profile.version) {
                steps.extend(addon_update_steps());
            }
            if doc.properties.adopt_via_fleet
                && !doc.properties.fleet_profile.was_created_by_fleet()
            {
                steps.extend(fleet_adoption_steps());
            }
            // Last, so the marker reflects a fully performed update
            steps.push(Step::action("update_provisioned_by", ops::update_provisioned_by));
        }
        MaintenanceTask::Operator => {
            steps.extend(certificate_renewal_steps());
            if should_update_addon(&doc.properties.cluster_profile.version) {
                steps.extend(addon_update_steps());
            }
        }
        MaintenanceTask::RenewCerts => {
            steps.extend(certificate_renewal_steps());
        }
    }

    steps
}

/// Steps safe and necessary for every maintenance task
fn zeroth_steps(refresher: &Arc<dyn CredentialRefresher>) -> Vec<Step<ClusterContext>> {
    vec![
        Step::action("initialize_cluster_clients", ops::initialize_cluster_clients),
        Step::action("ensure_billing_record", ops::ensure_billing_record),
        Step::action("ensure_defaults", ops::ensure_defaults),
        Step::retrying_action(
            "fixup_service_principal_object_id",
            refresher.clone(),
            ops::fixup_service_principal_object_id,
        ),
        Step::action("start_vms", ops::start_vms),
        Step::condition("api_servers_ready", ops::api_servers_ready, minutes(30), true),
        // Old clusters lack an infra id in the store
        Step::action("fix_infra_id", ops::fix_infra_id),
    ]
}

/// Generic fix-ups that are safe to always take
fn general_fixes_steps() -> Vec<Step<ClusterContext>> {
    vec![
        Step::action("ensure_resource_group", ops::ensure_resource_group),
        Step::action(
            "create_or_update_deny_assignment",
            ops::create_or_update_deny_assignment,
        ),
        Step::action("ensure_service_endpoints", ops::ensure_service_endpoints),
        Step::action("migrate_storage_accounts", ops::migrate_storage_accounts),
        Step::action("fix_ssh", ops::fix_ssh),
        Step::action("fix_sre_kubeconfig", ops::fix_sre_kubeconfig),
        Step::action("fix_user_admin_kubeconfig", ops::fix_user_admin_kubeconfig),
        Step::action("create_or_update_router_ip", ops::create_or_update_router_ip),
        Step::action("ensure_gateway_upgrade", ops::ensure_gateway_upgrade),
        Step::action("rotate_registry_token", ops::rotate_registry_token),
        Step::action("ensure_mtu_size", ops::ensure_mtu_size),
    ]
}

fn certificate_renewal_steps() -> Vec<Step<ClusterContext>> {
    vec![
        Step::action(
            "configure_api_server_certificate",
            ops::configure_api_server_certificate,
        ),
        Step::action(
            "configure_ingress_certificate",
            ops::configure_ingress_certificate,
        ),
        Step::action("initialize_addon_deployer", ops::initialize_addon_deployer),
        // Depends on initialize_addon_deployer
        Step::action("renew_telemetry_certificate", ops::renew_telemetry_certificate),
    ]
}

/// Gated on the running platform version; the deployer is already
/// initialized by the certificate renewal block, which always
/// precedes this one.
fn addon_update_steps() -> Vec<Step<ClusterContext>> {
    vec![
        Step::action("ensure_addon", ops::ensure_addon),
        Step::condition(
            "addon_deployment_ready",
            ops::addon_deployment_ready,
            minutes(20),
            true,
        ),
        Step::condition(
            "addon_running_desired_version",
            ops::addon_running_desired_version,
            minutes(5),
            true,
        ),
    ]
}

fn fleet_adoption_steps() -> Vec<Step<ClusterContext>> {
    vec![
        Step::action("fleet_create_namespace", ops::fleet_create_namespace),
        Step::action("fleet_ensure_resources", ops::fleet_ensure_resources),
        Step::condition(
            "fleet_deployment_ready",
            ops::fleet_deployment_ready,
            minutes(5),
            false,
        ),
        Step::action(
            "fleet_reset_correlation_data",
            ops::fleet_reset_correlation_data,
        ),
    ]
}

//! Update workflow assembly: the credential-rotation path
//!
//! One fixed sequence rotating the cluster's service-principal RBAC,
//! registry token, and certificates, then cycling the add-on so it
//! picks up the refreshed secrets. Fleet reconciliation steps are
//! appended only when that integration is active for the cluster.

use std::sync::Arc;
use std::time::Duration;

use stratus_steps::{CredentialRefresher, Step};

use crate::context::ClusterContext;
use crate::document::ClusterDocument;
use crate::ops;

const fn minutes(m: u64) -> Duration {
    Duration::from_secs(m * 60)
}

pub fn update_steps(
    doc: &ClusterDocument,
    refresher: &Arc<dyn CredentialRefresher>,
) -> Vec<Step<ClusterContext>> {
    let mut steps = vec![
        Step::retrying_action("validate_resources", refresher.clone(), ops::validate_resources),
        // All initialization steps come first
        Step::action("initialize_cluster_clients", ops::initialize_cluster_clients),
        Step::action("initialize_addon_deployer", ops::initialize_addon_deployer),
        Step::action(
            "initialize_service_principal_clients",
            ops::initialize_service_principal_clients,
        ),
        Step::retrying_action(
            "resolve_service_principal_object_id",
            refresher.clone(),
            ops::resolve_service_principal_object_id,
        ),
        Step::action(
            "create_or_update_service_principal_rbac",
            ops::create_or_update_service_principal_rbac,
        ),
        Step::action(
            "create_or_update_deny_assignment",
            ops::create_or_update_deny_assignment,
        ),
        Step::action("start_vms", ops::start_vms),
        Step::condition("api_servers_ready", ops::api_servers_ready, minutes(30), true),
        Step::action("rotate_registry_token", ops::rotate_registry_token),
        Step::action(
            "configure_api_server_certificate",
            ops::configure_api_server_certificate,
        ),
        Step::action(
            "configure_ingress_certificate",
            ops::configure_ingress_certificate,
        ),
        Step::action("renew_telemetry_certificate", ops::renew_telemetry_certificate),
        Step::action("ensure_credentials_request", ops::ensure_credentials_request),
        Step::action("update_platform_secret", ops::update_platform_secret),
        Step::condition(
            "credentials_request_reconciled",
            ops::credentials_request_reconciled,
            minutes(3),
            true,
        ),
        Step::action("update_addon_secret", ops::update_addon_secret),
        // Restarting is the point: pick up any changes made to the
        // secrets above
        Step::action("restart_addon_controller", ops::restart_addon_controller),
        Step::condition(
            "addon_deployment_ready",
            ops::addon_deployment_ready,
            minutes(5),
            true,
        ),
        Step::action(
            "reconcile_load_balancer_profile",
            ops::reconcile_load_balancer_profile,
        ),
    ];

    if doc.properties.adopt_via_fleet {
        steps.extend([
            Step::action("fleet_create_namespace", ops::fleet_create_namespace),
            Step::action("fleet_ensure_resources", ops::fleet_ensure_resources),
            Step::condition(
                "fleet_deployment_ready",
                ops::fleet_deployment_ready,
                minutes(5),
                true,
            ),
            Step::action(
                "fleet_reset_correlation_data",
                ops::fleet_reset_correlation_data,
            ),
        ]);
    }

    steps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{CallRecorder, SimCredentialRefresher};
    use std::collections::HashSet;

    fn refresher() -> Arc<dyn CredentialRefresher> {
        SimCredentialRefresher::new(CallRecorder::new())
    }

    #[test]
    fn test_update_sequence() {
        let doc = ClusterDocument::new("demo", "clusters/demo");
        let steps = update_steps(&doc, &refresher());
        let names: Vec<&str> = steps.iter().map(|s| s.friendly_name()).collect();

        assert_eq!(names.first(), Some(&"validate_resources"));
        assert_eq!(names.last(), Some(&"reconcile_load_balancer_profile"));

        // The secret update must land before the controller restart
        let secret = names.iter().position(|n| *n == "update_addon_secret").unwrap();
        let restart = names
            .iter()
            .position(|n| *n == "restart_addon_controller")
            .unwrap();
        assert!(secret < restart);

        assert!(!names.contains(&"fleet_ensure_resources"));

        let mut seen = HashSet::new();
        for name in &names {
            assert!(seen.insert(*name), "duplicate step name: {name}");
        }
    }

    #[test]
    fn test_update_appends_fleet_steps_when_adopting() {
        let mut doc = ClusterDocument::new("demo", "clusters/demo");
        doc.properties.adopt_via_fleet = true;
        let steps = update_steps(&doc, &refresher());
        let names: Vec<&str> = steps.iter().map(|s| s.friendly_name()).collect();

        assert_eq!(names.last(), Some(&"fleet_reset_correlation_data"));
        assert!(names.contains(&"fleet_create_namespace"));
        assert!(names.contains(&"fleet_deployment_ready"));
    }
}

//! Persisted cluster document model
//!
//! The document is externally owned state: the engine reads one
//! snapshot per invocation and mutates it only through explicit steps
//! that call the store's lease-guarded patch. The install phase is
//! persisted as a raw integer so a document written by a newer
//! deployment (with phases this build does not know) is surfaced as a
//! configuration error instead of a panic.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Checkpoints of a multi-stage installation, persisted so a restarted
/// process resumes where the previous one stopped. Advanced only by
/// the explicit increment step, never by the runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum InstallPhase {
    Bootstrap,
    RemoveBootstrap,
}

impl InstallPhase {
    pub fn next(self) -> Option<InstallPhase> {
        match self {
            InstallPhase::Bootstrap => Some(InstallPhase::RemoveBootstrap),
            InstallPhase::RemoveBootstrap => None,
        }
    }
}

impl From<InstallPhase> for u8 {
    fn from(phase: InstallPhase) -> u8 {
        match phase {
            InstallPhase::Bootstrap => 0,
            InstallPhase::RemoveBootstrap => 1,
        }
    }
}

impl TryFrom<u8> for InstallPhase {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, u8> {
        match value {
            0 => Ok(InstallPhase::Bootstrap),
            1 => Ok(InstallPhase::RemoveBootstrap),
            other => Err(other),
        }
    }
}

/// In-progress installation state; present on the document only while
/// an install is underway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Install {
    /// When the installation started; also seeds time-limited access
    /// tokens handed to the bootstrap machine
    pub now: DateTime<Utc>,

    /// Raw persisted phase; converted to [`InstallPhase`] at the
    /// start of each invocation
    pub phase: u8,
}

impl Install {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now,
            phase: InstallPhase::Bootstrap.into(),
        }
    }
}

/// Maintenance task selector for admin updates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaintenanceTask {
    /// The full maintenance pass; also selected by the legacy empty
    /// string
    #[default]
    #[serde(rename = "Everything", alias = "")]
    Everything,
    Operator,
    RenewCerts,
}

/// User-visible lifecycle state of the cluster resource
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProvisioningState {
    #[default]
    Creating,
    Updating,
    AdminUpdating,
    Succeeded,
    Failed,
    Deleting,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterProfile {
    /// Running platform version, as reported by the cluster; untrusted
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub domain: String,
}

/// State of the cluster's registration with the fleet reconciliation
/// service, if any.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FleetProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default)]
    pub created_by_fleet: bool,
}

impl FleetProfile {
    /// True if the cluster was originally provisioned through the
    /// fleet service, in which case adoption is a no-op.
    pub fn was_created_by_fleet(&self) -> bool {
        self.namespace.is_some() && self.created_by_fleet
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterProperties {
    #[serde(default)]
    pub provisioning_state: ProvisioningState,

    /// Release that last completed a full admin update; external
    /// maintenance tooling keys off this marker
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioned_by: Option<String>,

    #[serde(default)]
    pub infra_id: String,

    #[serde(default)]
    pub maintenance_task: MaintenanceTask,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install: Option<Install>,

    #[serde(default)]
    pub cluster_profile: ClusterProfile,

    #[serde(default)]
    pub fleet_profile: FleetProfile,

    /// Delegate provisioning to the fleet installation service
    #[serde(default)]
    pub install_via_fleet: bool,

    /// Register a directly provisioned cluster with the fleet
    /// reconciliation service
    #[serde(default)]
    pub adopt_via_fleet: bool,
}

/// The persisted cluster entity. `key` is the store key; `id` the
/// user-facing resource identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterDocument {
    pub id: String,
    pub key: String,
    pub properties: ClusterProperties,
}

impl ClusterDocument {
    pub fn new(id: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            key: key.into(),
            properties: ClusterProperties::default(),
        }
    }

    /// True if any fleet integration applies to this cluster
    pub fn fleet_involved(&self) -> bool {
        self.properties.install_via_fleet || self.properties.adopt_via_fleet
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_round_trip() {
        assert_eq!(InstallPhase::try_from(0), Ok(InstallPhase::Bootstrap));
        assert_eq!(InstallPhase::try_from(1), Ok(InstallPhase::RemoveBootstrap));
        assert_eq!(InstallPhase::try_from(7), Err(7));
        assert_eq!(u8::from(InstallPhase::RemoveBootstrap), 1);
    }

    #[test]
    fn test_phase_ordering() {
        assert_eq!(
            InstallPhase::Bootstrap.next(),
            Some(InstallPhase::RemoveBootstrap)
        );
        assert_eq!(InstallPhase::RemoveBootstrap.next(), None);
    }

    #[test]
    fn test_maintenance_task_legacy_empty_string() {
        let task: MaintenanceTask = serde_json::from_str("\"\"").unwrap();
        assert_eq!(task, MaintenanceTask::Everything);

        let task: MaintenanceTask = serde_json::from_str("\"RenewCerts\"").unwrap();
        assert_eq!(task, MaintenanceTask::RenewCerts);

        assert_eq!(MaintenanceTask::default(), MaintenanceTask::Everything);
    }

    #[test]
    fn test_document_serialization() {
        let mut doc = ClusterDocument::new("demo", "clusters/demo");
        doc.properties.install = Some(Install::new(Utc::now()));
        doc.properties.cluster_profile.version = "4.10.3".to_string();

        let json = serde_json::to_string(&doc).unwrap();
        assert!(json.contains("\"clusterProfile\""));
        assert!(json.contains("\"phase\":0"));

        let parsed: ClusterDocument = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, doc);
    }

    #[test]
    fn test_created_by_fleet_requires_namespace() {
        let mut profile = FleetProfile::default();
        profile.created_by_fleet = true;
        assert!(!profile.was_created_by_fleet());

        profile.namespace = Some("fleet-demo".to_string());
        assert!(profile.was_created_by_fleet());
    }
}

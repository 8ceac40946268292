//! Managed-cluster lifecycle workflows
//!
//! Builds on the `stratus-steps` engine: the persisted cluster
//! document and its phase checkpoints, the lease-guarded document
//! store, the collaborator interfaces step bodies call, the three
//! workflow assemblers (install, update, admin update), the
//! [`ClusterManager`] driving them, and the collect-all health
//! monitor.

pub mod admin;
pub mod clients;
pub mod context;
pub mod diagnostics;
pub mod document;
pub mod error;
pub mod install;
pub mod manager;
pub mod monitor;
pub mod ops;
pub mod sim;
pub mod store;
pub mod update;
pub mod version;

pub use clients::{CloudClient, ClusterClient, ClusterClientFactory, FleetClient};
pub use context::ClusterContext;
pub use diagnostics::{DiagnosticsCollector, DIAGNOSTICS_TIMEOUT};
pub use document::{
    ClusterDocument, ClusterProfile, ClusterProperties, FleetProfile, Install, InstallPhase,
    MaintenanceTask, ProvisioningState,
};
pub use error::{ClusterError, Result};
pub use manager::ClusterManager;
pub use monitor::{ClusterMonitor, ProbeFailure, MONITOR_FAILURE_METRIC};
pub use store::{ClusterDocumentMutator, ClusterStore, MemoryClusterStore};
pub use version::{should_update_addon, Version, ADDON_CUTOFF_VERSION};

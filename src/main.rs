//! Dev harness for the cluster lifecycle workflows
//!
//! Drives the install, update, admin-update, and monitor flows
//! against the in-memory store and simulated collaborators, with
//! gauges logged through tracing. Ctrl-C cancels the running flow
//! through the runner's shutdown signal.

use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::Result;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use stratus_cluster::sim::{
    CallRecorder, SimCloudClient, SimClusterClient, SimClusterClientFactory,
    SimCredentialRefresher, SimDiagnostics, SimFleetClient,
};
use stratus_cluster::{
    ClusterDocument, ClusterManager, ClusterMonitor, ClusterStore, MaintenanceTask,
    MemoryClusterStore,
};
use stratus_steps::{Runner, TracingEmitter};

#[derive(Parser)]
#[command(name = "stratus", version, about = "Managed-cluster lifecycle operations")]
struct Cli {
    /// Cluster name to operate on
    #[arg(long, default_value = "demo")]
    cluster: String,

    /// Running platform version reported by the simulated cluster
    #[arg(long, default_value = "4.10.3")]
    cluster_version: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run installation phases until the install completes
    Install {
        /// Delegate provisioning to the fleet installation service
        #[arg(long)]
        via_fleet: bool,

        /// Adopt the cluster into fleet reconciliation
        #[arg(long)]
        adopt: bool,
    },

    /// Run the credential-rotation update flow
    Update {
        #[arg(long)]
        adopt: bool,
    },

    /// Run the admin maintenance flow
    AdminUpdate {
        #[arg(long, value_enum, default_value_t = TaskArg::Everything)]
        task: TaskArg,
    },

    /// Run one health-monitor pass
    Monitor,
}

#[derive(Clone, Copy, ValueEnum)]
enum TaskArg {
    Everything,
    Operator,
    RenewCerts,
}

impl From<TaskArg> for MaintenanceTask {
    fn from(task: TaskArg) -> Self {
        match task {
            TaskArg::Everything => MaintenanceTask::Everything,
            TaskArg::Operator => MaintenanceTask::Operator,
            TaskArg::RenewCerts => MaintenanceTask::RenewCerts,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let key = format!("clusters/{}", cli.cluster);

    let store = Arc::new(MemoryClusterStore::new());
    let mut doc = ClusterDocument::new(cli.cluster.clone(), key.clone());
    doc.properties.cluster_profile.version = cli.cluster_version.clone();

    match &cli.command {
        Command::Install { via_fleet, adopt } => {
            doc.properties.install_via_fleet = *via_fleet;
            doc.properties.adopt_via_fleet = *adopt;
        }
        Command::Update { adopt } => {
            doc.properties.adopt_via_fleet = *adopt;
        }
        Command::AdminUpdate { task } => {
            doc.properties.maintenance_task = (*task).into();
        }
        Command::Monitor => {}
    }
    store.put(doc).await?;

    let recorder = CallRecorder::new();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("shutdown requested, cancelling run");
            let _ = shutdown_tx.send(true);
        }
    });

    let manager = ClusterManager::new(
        store.clone(),
        SimCloudClient::new(recorder.clone()),
        SimFleetClient::new(recorder.clone()),
        SimClusterClientFactory::new(recorder.clone()),
        SimCredentialRefresher::new(recorder.clone()),
    )
    .with_metrics(Arc::new(TracingEmitter))
    .with_diagnostics(SimDiagnostics::new(recorder.clone()))
    .with_runner(Runner::new().with_shutdown(shutdown_rx));

    match cli.command {
        Command::Install { .. } => {
            // Each invocation runs one persisted phase; loop until the
            // install state clears, as the controlling backend would
            loop {
                manager.install(&key).await?;
                if store.get(&key).await?.properties.install.is_none() {
                    break;
                }
            }
            info!(cluster = %cli.cluster, "install complete");
        }
        Command::Update { .. } => {
            manager.update(&key).await?;
            info!(cluster = %cli.cluster, "update complete");
        }
        Command::AdminUpdate { .. } => {
            manager.admin_update(&key).await?;
            let provisioned_by = store.get(&key).await?.properties.provisioned_by;
            info!(cluster = %cli.cluster, ?provisioned_by, "admin update complete");
        }
        Command::Monitor => {
            let monitor = ClusterMonitor::new(
                SimClusterClient::new(recorder.clone()),
                Arc::new(TracingEmitter),
            );
            let failures = monitor.check().await;
            info!(failures = failures.len(), "monitor pass complete");
        }
    }

    info!(steps_invoked = recorder.calls().len(), "done");
    Ok(())
}

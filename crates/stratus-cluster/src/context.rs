//! Per-invocation execution context
//!
//! Each lifecycle invocation constructs one [`ClusterContext`] holding
//! a snapshot of the cluster document and the collaborator handles,
//! and threads it into every step body. Clients are never mutable
//! fields on a long-lived controller; the in-cluster client is set
//! exactly once by the initialization step, because during bootstrap
//! there is no cluster API to talk to yet.

use std::sync::Arc;

use stratus_steps::StepError;
use tokio::sync::{OnceCell, RwLock};

use crate::clients::{CloudClient, ClusterClient, ClusterClientFactory, FleetClient};
use crate::document::ClusterDocument;
use crate::error::{ClusterError, Result};
use crate::store::{ClusterDocumentMutator, ClusterStore};

pub struct ClusterContext {
    key: String,
    doc: RwLock<ClusterDocument>,
    store: Arc<dyn ClusterStore>,
    cloud: Arc<dyn CloudClient>,
    fleet: Arc<dyn FleetClient>,
    cluster_factory: Arc<dyn ClusterClientFactory>,
    cluster: OnceCell<Arc<dyn ClusterClient>>,
}

impl ClusterContext {
    pub fn new(
        doc: ClusterDocument,
        store: Arc<dyn ClusterStore>,
        cloud: Arc<dyn CloudClient>,
        fleet: Arc<dyn FleetClient>,
        cluster_factory: Arc<dyn ClusterClientFactory>,
    ) -> Arc<Self> {
        Arc::new(Self {
            key: doc.key.clone(),
            doc: RwLock::new(doc),
            store,
            cloud,
            fleet,
            cluster_factory,
            cluster: OnceCell::new(),
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Current document snapshot
    pub async fn doc(&self) -> ClusterDocument {
        self.doc.read().await.clone()
    }

    pub fn cloud(&self) -> &Arc<dyn CloudClient> {
        &self.cloud
    }

    pub fn fleet(&self) -> &Arc<dyn FleetClient> {
        &self.fleet
    }

    /// The in-cluster client; an error until the
    /// initialize-cluster-clients step has run
    pub fn cluster(&self) -> std::result::Result<&Arc<dyn ClusterClient>, StepError> {
        self.cluster
            .get()
            .ok_or_else(|| ClusterError::ClientsNotInitialized.into())
    }

    /// Build the in-cluster client through the factory. Idempotent;
    /// repeat invocations reuse the first client.
    pub async fn initialize_cluster_clients(&self) -> std::result::Result<(), StepError> {
        let doc = self.doc().await;
        self.cluster
            .get_or_try_init(|| async { self.cluster_factory.new_cluster_client(&doc).await })
            .await?;
        Ok(())
    }

    /// Apply a lease-guarded patch to the persisted document and
    /// refresh the snapshot with the result.
    pub async fn patch(&self, mutator: ClusterDocumentMutator) -> Result<ClusterDocument> {
        let updated = self.store.patch_with_lease(&self.key, mutator).await?;
        *self.doc.write().await = updated.clone();
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Install;
    use crate::sim::{
        CallRecorder, SimCloudClient, SimClusterClientFactory, SimFleetClient,
    };
    use crate::store::MemoryClusterStore;
    use chrono::Utc;

    async fn demo_context() -> (Arc<ClusterContext>, Arc<CallRecorder>, Arc<MemoryClusterStore>) {
        let store = Arc::new(MemoryClusterStore::new());
        let doc = ClusterDocument::new("demo", "clusters/demo");
        store.put(doc.clone()).await.unwrap();

        let recorder = CallRecorder::new();
        let ctx = ClusterContext::new(
            doc,
            store.clone(),
            SimCloudClient::new(recorder.clone()),
            SimFleetClient::new(recorder.clone()),
            SimClusterClientFactory::new(recorder.clone()),
        );
        (ctx, recorder, store)
    }

    #[tokio::test]
    async fn test_cluster_client_requires_initialization() {
        let (ctx, recorder, _store) = demo_context().await;

        assert!(ctx.cluster().is_err());

        ctx.initialize_cluster_clients().await.unwrap();
        ctx.cluster().unwrap();

        // Idempotent: the factory runs once
        ctx.initialize_cluster_clients().await.unwrap();
        assert_eq!(recorder.count("new_cluster_client"), 1);
    }

    #[tokio::test]
    async fn test_patch_refreshes_snapshot() {
        let (ctx, _recorder, store) = demo_context().await;

        ctx.patch(Box::new(|doc| {
            doc.properties.install = Some(Install::new(Utc::now()));
            Ok(())
        }))
        .await
        .unwrap();

        assert!(ctx.doc().await.properties.install.is_some());
        let persisted = store.get("clusters/demo").await.unwrap();
        assert!(persisted.properties.install.is_some());
    }
}

//! Cluster document store with lease-guarded patching
//!
//! All cross-invocation durable state lives in the document store.
//! Mutation goes through [`ClusterStore::patch_with_lease`], which
//! guarantees at most one writer holds a key's lease at a time; the
//! engine never writes a document directly.

use std::collections::HashMap;
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::document::ClusterDocument;
use crate::error::{ClusterError, Result};

/// Exclusive mutation applied under the document's lease. Returning
/// an error aborts the patch without persisting anything.
pub type ClusterDocumentMutator =
    Box<dyn FnOnce(&mut ClusterDocument) -> Result<()> + Send>;

/// Persisted cluster document storage
#[async_trait]
pub trait ClusterStore: Send + Sync {
    /// Fetch the current document for `key`
    async fn get(&self, key: &str) -> Result<ClusterDocument>;

    /// Insert or replace a document, keyed by its `key` field
    async fn put(&self, doc: ClusterDocument) -> Result<()>;

    /// Acquire the key's lease, apply `mutator` to an exclusive copy,
    /// persist the result, release the lease. Returns the updated
    /// document.
    async fn patch_with_lease(
        &self,
        key: &str,
        mutator: ClusterDocumentMutator,
    ) -> Result<ClusterDocument>;
}

#[derive(Debug, Clone)]
struct Lease {
    holder: Uuid,
    expires_at: DateTime<Utc>,
}

/// In-memory store used by tests and the dev harness
pub struct MemoryClusterStore {
    docs: RwLock<HashMap<String, ClusterDocument>>,
    leases: Mutex<HashMap<String, Lease>>,
    lease_ttl: Duration,
}

impl Default for MemoryClusterStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryClusterStore {
    pub fn new() -> Self {
        Self {
            docs: RwLock::new(HashMap::new()),
            leases: Mutex::new(HashMap::new()),
            lease_ttl: Duration::seconds(60),
        }
    }

    pub fn with_lease_ttl(mut self, ttl: Duration) -> Self {
        self.lease_ttl = ttl;
        self
    }

    /// Take the key's lease. Fails with [`ClusterError::LeaseConflict`]
    /// while another unexpired holder exists; expired leases are
    /// silently reclaimed.
    pub fn acquire_lease(&self, key: &str) -> Result<Uuid> {
        let mut leases = self.leases.lock().unwrap();
        if let Some(lease) = leases.get(key) {
            if lease.expires_at > Utc::now() {
                return Err(ClusterError::LeaseConflict(key.to_string()));
            }
        }
        let holder = Uuid::new_v4();
        leases.insert(
            key.to_string(),
            Lease {
                holder,
                expires_at: Utc::now() + self.lease_ttl,
            },
        );
        Ok(holder)
    }

    /// Release the lease if `holder` still owns it
    pub fn release_lease(&self, key: &str, holder: Uuid) {
        let mut leases = self.leases.lock().unwrap();
        if leases.get(key).map(|l| l.holder) == Some(holder) {
            leases.remove(key);
        }
    }
}

#[async_trait]
impl ClusterStore for MemoryClusterStore {
    async fn get(&self, key: &str) -> Result<ClusterDocument> {
        self.docs
            .read()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| ClusterError::NotFound(key.to_string()))
    }

    async fn put(&self, doc: ClusterDocument) -> Result<()> {
        self.docs.write().unwrap().insert(doc.key.clone(), doc);
        Ok(())
    }

    async fn patch_with_lease(
        &self,
        key: &str,
        mutator: ClusterDocumentMutator,
    ) -> Result<ClusterDocument> {
        let holder = self.acquire_lease(key)?;

        let result = (|| {
            let mut doc = self
                .docs
                .read()
                .unwrap()
                .get(key)
                .cloned()
                .ok_or_else(|| ClusterError::NotFound(key.to_string()))?;
            mutator(&mut doc)?;
            self.docs
                .write()
                .unwrap()
                .insert(key.to_string(), doc.clone());
            Ok(doc)
        })();

        self.release_lease(key, holder);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Install;

    fn seeded_store() -> MemoryClusterStore {
        let store = MemoryClusterStore::new();
        store.docs.write().unwrap().insert(
            "clusters/demo".to_string(),
            ClusterDocument::new("demo", "clusters/demo"),
        );
        store
    }

    #[tokio::test]
    async fn test_get_missing() {
        let store = MemoryClusterStore::new();
        let err = store.get("clusters/nope").await.unwrap_err();
        assert!(matches!(err, ClusterError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_patch_persists_mutation() {
        let store = seeded_store();

        let updated = store
            .patch_with_lease(
                "clusters/demo",
                Box::new(|doc| {
                    doc.properties.install = Some(Install::new(Utc::now()));
                    Ok(())
                }),
            )
            .await
            .unwrap();
        assert!(updated.properties.install.is_some());

        let fetched = store.get("clusters/demo").await.unwrap();
        assert_eq!(fetched, updated);
    }

    #[tokio::test]
    async fn test_mutator_error_aborts_patch_and_releases_lease() {
        let store = seeded_store();

        let err = store
            .patch_with_lease(
                "clusters/demo",
                Box::new(|doc| {
                    doc.properties.infra_id = "should-not-persist".to_string();
                    Err(ClusterError::InstallNotStarted)
                }),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ClusterError::InstallNotStarted));

        let doc = store.get("clusters/demo").await.unwrap();
        assert_eq!(doc.properties.infra_id, "");

        // The lease was released despite the failed mutator
        store.acquire_lease("clusters/demo").unwrap();
    }

    #[tokio::test]
    async fn test_patch_conflicts_with_held_lease() {
        let store = seeded_store();
        let holder = store.acquire_lease("clusters/demo").unwrap();

        let err = store
            .patch_with_lease("clusters/demo", Box::new(|_doc| Ok(())))
            .await
            .unwrap_err();
        assert!(matches!(err, ClusterError::LeaseConflict(_)));

        store.release_lease("clusters/demo", holder);
        store
            .patch_with_lease("clusters/demo", Box::new(|_doc| Ok(())))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_expired_lease_is_reclaimed() {
        let store = seeded_store().with_lease_ttl(Duration::seconds(-1));
        store.acquire_lease("clusters/demo").unwrap();

        // The first lease is already past its expiry
        store.acquire_lease("clusters/demo").unwrap();
    }
}

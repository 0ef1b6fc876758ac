//! Cluster API access used by the finalizer
//!
//! The finalizer only reads and patches a handful of object kinds. They are
//! accessed through [`ClusterClient`] so the reconciler can run against the
//! real API server or an in-memory cluster in tests.

mod kube_client;
mod patch;

pub use kube_client::KubeClusterClient;
pub use patch::merge_patch;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{PersistentVolume, PersistentVolumeClaim};

use crate::crd::{Backup, BackupStorageLocation, Restore};
use crate::error::Result;

/// Field manager recorded on every patch this operator submits
pub const FIELD_MANAGER: &str = "restore-finalizer-operator";

/// Cluster operations needed to finalize restores
///
/// Getters return `Ok(None)` when the object does not exist. Patch methods
/// take the object as it was read and the desired object, and submit only
/// the difference between the two.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Get a Restore by namespace and name
    async fn get_restore(&self, namespace: &str, name: &str) -> Result<Option<Restore>>;

    /// Patch a Restore's status from `original` to `updated`
    async fn patch_restore(&self, original: &Restore, updated: &Restore) -> Result<()>;

    /// Get a Backup by namespace and name
    async fn get_backup(&self, namespace: &str, name: &str) -> Result<Option<Backup>>;

    /// Get a BackupStorageLocation by namespace and name
    async fn get_backup_storage_location(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<BackupStorageLocation>>;

    /// Get a PersistentVolumeClaim by namespace and name
    async fn get_pvc(&self, namespace: &str, name: &str)
        -> Result<Option<PersistentVolumeClaim>>;

    /// Get a PersistentVolume by name
    async fn get_pv(&self, name: &str) -> Result<Option<PersistentVolume>>;

    /// Patch a PersistentVolume from `original` to `updated`
    async fn patch_pv(&self, original: &PersistentVolume, updated: &PersistentVolume)
        -> Result<()>;
}

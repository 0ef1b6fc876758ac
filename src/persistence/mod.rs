//! Backup metadata persistence
//!
//! Backup metadata and restore results live in an object store reached
//! through a [`BackupStore`]. Stores are obtained per storage location from a
//! [`BackupStoreGetter`], using clients owned by a [`PluginManager`].

mod local;
mod plugin;

pub use local::{LocalBackupStore, LocalBackupStoreGetter, LOCAL_PROVIDER};
pub use plugin::{LocalPluginManager, PluginManager, PluginManagerGuard};

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::crd::BackupStorageLocation;
use crate::error::Result;
use crate::results::Results;
use crate::volume::VolumeInfo;

/// Key of the warnings entry in stored restore results
pub const WARNINGS_KEY: &str = "warnings";

/// Key of the errors entry in stored restore results
pub const ERRORS_KEY: &str = "errors";

/// Restored resources keyed by resource type, e.g. `v1/PersistentVolumeClaim`
pub type RestoredResourceList = HashMap<String, Vec<String>>;

/// Read/write access to one storage location's backup metadata
#[async_trait]
pub trait BackupStore: Send + Sync {
    /// Volume records captured for a backup
    async fn get_backup_volume_infos(&self, backup_name: &str) -> Result<Vec<VolumeInfo>>;

    /// Resources recorded by the main restore phase
    async fn get_restored_resource_list(&self, restore_name: &str) -> Result<RestoredResourceList>;

    /// Previously stored results, keyed by [`WARNINGS_KEY`] and [`ERRORS_KEY`]
    async fn get_restore_results(&self, restore_name: &str) -> Result<HashMap<String, Results>>;

    /// Replace the stored results of a restore
    async fn put_restore_results(
        &self,
        restore_name: &str,
        results: &HashMap<String, Results>,
    ) -> Result<()>;
}

/// Resolves a storage location to a [`BackupStore`]
#[async_trait]
pub trait BackupStoreGetter: Send + Sync {
    async fn get(
        &self,
        location: &BackupStorageLocation,
        plugins: &dyn PluginManager,
    ) -> Result<Arc<dyn BackupStore>>;
}

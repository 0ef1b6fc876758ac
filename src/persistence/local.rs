//! Local filesystem object store
//!
//! Stores backup metadata as JSON objects under a root directory, typically a
//! mounted PVC. Layout under `<root>/<bucket>/<prefix>/`:
//!
//! - `backups/<backup>/<backup>-volumeinfo.json`
//! - `restores/<restore>/restore-<restore>-resource-list.json`
//! - `restores/<restore>/restore-<restore>-results.json`

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::crd::BackupStorageLocation;
use crate::error::{Error, Result};
use crate::results::Results;
use crate::volume::VolumeInfo;

use super::{BackupStore, BackupStoreGetter, PluginManager, RestoredResourceList};

/// Provider name served by [`LocalBackupStoreGetter`]
pub const LOCAL_PROVIDER: &str = "local";

/// Backup store rooted at a local directory
#[derive(Debug, Clone)]
pub struct LocalBackupStore {
    base: PathBuf,
}

impl LocalBackupStore {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn volume_info_path(&self, backup_name: &str) -> PathBuf {
        self.base
            .join("backups")
            .join(backup_name)
            .join(format!("{}-volumeinfo.json", backup_name))
    }

    pub fn resource_list_path(&self, restore_name: &str) -> PathBuf {
        self.restore_dir(restore_name)
            .join(format!("restore-{}-resource-list.json", restore_name))
    }

    pub fn results_path(&self, restore_name: &str) -> PathBuf {
        self.restore_dir(restore_name)
            .join(format!("restore-{}-results.json", restore_name))
    }

    fn restore_dir(&self, restore_name: &str) -> PathBuf {
        self.base.join("restores").join(restore_name)
    }
}

/// Read a JSON object, treating a missing object as `T::default()`
async fn read_object<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
    match tokio::fs::read(path).await {
        Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
            Error::storage(format!("Failed to decode object {:?}: {}", path, e))
        }),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = ?path, "Object not found, treating as empty");
            Ok(T::default())
        }
        Err(e) => Err(Error::storage(format!(
            "Failed to read object {:?}: {}",
            path, e
        ))),
    }
}

#[async_trait]
impl BackupStore for LocalBackupStore {
    async fn get_backup_volume_infos(&self, backup_name: &str) -> Result<Vec<VolumeInfo>> {
        read_object(&self.volume_info_path(backup_name)).await
    }

    async fn get_restored_resource_list(&self, restore_name: &str) -> Result<RestoredResourceList> {
        read_object(&self.resource_list_path(restore_name)).await
    }

    async fn get_restore_results(&self, restore_name: &str) -> Result<HashMap<String, Results>> {
        read_object(&self.results_path(restore_name)).await
    }

    async fn put_restore_results(
        &self,
        restore_name: &str,
        results: &HashMap<String, Results>,
    ) -> Result<()> {
        let path = self.results_path(restore_name);
        let body = serde_json::to_vec(results)?;

        tokio::fs::create_dir_all(self.restore_dir(restore_name))
            .await
            .map_err(|e| Error::storage(format!("Failed to create {:?}: {}", path, e)))?;

        // Write then rename so readers never observe a partial object
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body)
            .await
            .map_err(|e| Error::storage(format!("Failed to write {:?}: {}", tmp, e)))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| Error::storage(format!("Failed to commit {:?}: {}", path, e)))?;
        Ok(())
    }
}

/// Resolves `local` storage locations to directories under a root path
#[derive(Debug, Clone)]
pub struct LocalBackupStoreGetter {
    root: PathBuf,
}

impl LocalBackupStoreGetter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl BackupStoreGetter for LocalBackupStoreGetter {
    async fn get(
        &self,
        location: &BackupStorageLocation,
        _plugins: &dyn PluginManager,
    ) -> Result<Arc<dyn BackupStore>> {
        let spec = &location.spec;
        if spec.provider != LOCAL_PROVIDER {
            return Err(Error::config(format!(
                "Unsupported object store provider: {}",
                spec.provider
            )));
        }
        if spec.object_storage.bucket.is_empty() {
            return Err(Error::config("Object storage bucket must be specified"));
        }

        let mut base = self.root.join(&spec.object_storage.bucket);
        if let Some(prefix) = spec.object_storage.prefix.as_deref() {
            base = base.join(prefix.trim_matches('/'));
        }

        Ok(Arc::new(LocalBackupStore::new(base)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{BackupStorageLocationSpec, ObjectStorageLocation};
    use crate::persistence::{LocalPluginManager, ERRORS_KEY};
    use tempfile::tempdir;

    fn location(provider: &str, prefix: Option<&str>) -> BackupStorageLocation {
        BackupStorageLocation::new(
            "default",
            BackupStorageLocationSpec {
                provider: provider.to_string(),
                object_storage: ObjectStorageLocation {
                    bucket: "backups".to_string(),
                    prefix: prefix.map(str::to_string),
                },
                config: Default::default(),
            },
        )
    }

    #[tokio::test]
    async fn test_missing_objects_read_as_empty() {
        let dir = tempdir().unwrap();
        let store = LocalBackupStore::new(dir.path());

        assert!(store.get_backup_volume_infos("b1").await.unwrap().is_empty());
        assert!(store.get_restored_resource_list("r1").await.unwrap().is_empty());
        assert!(store.get_restore_results("r1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_results_are_written_and_read_back() {
        let dir = tempdir().unwrap();
        let store = LocalBackupStore::new(dir.path());

        let mut errors = Results::new();
        errors.add("ns1", "boom");
        let mut stored = HashMap::new();
        stored.insert(ERRORS_KEY.to_string(), errors.clone());

        store.put_restore_results("r1", &stored).await.unwrap();

        let read = store.get_restore_results("r1").await.unwrap();
        assert_eq!(read.get(ERRORS_KEY), Some(&errors));
        assert!(store.results_path("r1").exists());
    }

    #[tokio::test]
    async fn test_corrupt_object_is_a_storage_error() {
        let dir = tempdir().unwrap();
        let store = LocalBackupStore::new(dir.path());
        let path = store.volume_info_path("b1");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"not json").unwrap();

        let err = store.get_backup_volume_infos("b1").await.unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
    }

    #[tokio::test]
    async fn test_getter_rejects_unknown_provider() {
        let getter = LocalBackupStoreGetter::new("/tmp");
        let result = getter.get(&location("aws", None), &LocalPluginManager).await;
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_getter_roots_store_at_bucket_and_prefix() {
        let dir = tempdir().unwrap();
        let getter = LocalBackupStoreGetter::new(dir.path());
        let store = getter
            .get(&location(LOCAL_PROVIDER, Some("/cluster-a/")), &LocalPluginManager)
            .await
            .unwrap();

        let mut stored = HashMap::new();
        stored.insert(ERRORS_KEY.to_string(), Results::new());
        store.put_restore_results("r1", &stored).await.unwrap();

        assert!(dir
            .path()
            .join("backups/cluster-a/restores/r1/restore-r1-results.json")
            .exists());
    }
}

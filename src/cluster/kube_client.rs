//! kube-rs backed [`ClusterClient`]

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{PersistentVolume, PersistentVolumeClaim};
use kube::{
    api::{Patch, PatchParams},
    Api, Client, Resource, ResourceExt,
};
use tracing::debug;

use crate::crd::{Backup, BackupStorageLocation, Restore};
use crate::error::{Error, Result};

use super::{merge_patch, ClusterClient, FIELD_MANAGER};

/// Real Kubernetes client implementation
#[derive(Clone)]
pub struct KubeClusterClient {
    client: Client,
}

impl KubeClusterClient {
    /// Create a new KubeClusterClient wrapping the given kube Client
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

fn diff<K: serde::Serialize>(original: &K, updated: &K) -> Result<Option<serde_json::Value>> {
    Ok(merge_patch(
        &serde_json::to_value(original)?,
        &serde_json::to_value(updated)?,
    ))
}

fn namespace_of<K: Resource>(obj: &K) -> Result<String> {
    obj.namespace()
        .ok_or_else(|| Error::validation(format!("{} has no namespace", obj.name_any())))
}

#[async_trait]
impl ClusterClient for KubeClusterClient {
    async fn get_restore(&self, namespace: &str, name: &str) -> Result<Option<Restore>> {
        let api: Api<Restore> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn patch_restore(&self, original: &Restore, updated: &Restore) -> Result<()> {
        let Some(patch) = diff(original, updated)? else {
            debug!(name = %original.name_any(), "Restore unchanged, skipping patch");
            return Ok(());
        };

        let namespace = namespace_of(original)?;
        let api: Api<Restore> = Api::namespaced(self.client.clone(), &namespace);
        api.patch_status(
            &original.name_any(),
            &PatchParams::apply(FIELD_MANAGER),
            &Patch::Merge(&patch),
        )
        .await?;
        Ok(())
    }

    async fn get_backup(&self, namespace: &str, name: &str) -> Result<Option<Backup>> {
        let api: Api<Backup> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn get_backup_storage_location(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<BackupStorageLocation>> {
        let api: Api<BackupStorageLocation> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn get_pvc(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<PersistentVolumeClaim>> {
        let api: Api<PersistentVolumeClaim> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn get_pv(&self, name: &str) -> Result<Option<PersistentVolume>> {
        let api: Api<PersistentVolume> = Api::all(self.client.clone());
        Ok(api.get_opt(name).await?)
    }

    async fn patch_pv(
        &self,
        original: &PersistentVolume,
        updated: &PersistentVolume,
    ) -> Result<()> {
        let Some(patch) = diff(original, updated)? else {
            return Ok(());
        };

        let api: Api<PersistentVolume> = Api::all(self.client.clone());
        api.patch(
            &original.name_any(),
            &PatchParams::apply(FIELD_MANAGER),
            &Patch::Merge(&patch),
        )
        .await?;
        Ok(())
    }
}

//! In-memory fakes of the cluster and the backup store
//!
//! The fake cluster counts concurrent PVC/PV reads so tests can check the
//! worker pool's concurrency bound.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{
    ObjectReference, PersistentVolume, PersistentVolumeClaim, PersistentVolumeClaimSpec,
    PersistentVolumeClaimStatus, PersistentVolumeSpec, PersistentVolumeStatus,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::core::ErrorResponse;
use kube::ResourceExt;

use restore_finalizer_operator::cluster::ClusterClient;
use restore_finalizer_operator::crd::{
    Backup, BackupSpec, BackupStorageLocation, BackupStorageLocationSpec, ObjectStorageLocation,
    Restore, RestorePhase, RestoreSpec, RestoreStatus,
};
use restore_finalizer_operator::persistence::{
    BackupStore, BackupStoreGetter, PluginManager, RestoredResourceList,
};
use restore_finalizer_operator::reconcilers::PluginManagerFactory;
use restore_finalizer_operator::results::Results;
use restore_finalizer_operator::volume::{BackupMethod, PvInfo, ReclaimPolicy, VolumeInfo};
use restore_finalizer_operator::{Error, Result};

pub const NAMESPACE: &str = "backup-system";
pub const BACKUP: &str = "nightly-1";
pub const LOCATION: &str = "default";

// ============================================================================
// Fake cluster
// ============================================================================

#[derive(Default)]
pub struct FakeCluster {
    pub restores: Mutex<HashMap<String, Restore>>,
    pub backups: Mutex<HashMap<String, Backup>>,
    pub locations: Mutex<HashMap<String, BackupStorageLocation>>,
    pub pvcs: Mutex<HashMap<String, PersistentVolumeClaim>>,
    pub pvs: Mutex<HashMap<String, PersistentVolume>>,
    /// API error codes returned by upcoming PVC reads, in order
    pub pvc_failures: Mutex<VecDeque<u16>>,
    /// API error code returned when patching the named PV
    pub pv_patch_failures: Mutex<HashMap<String, u16>>,
    pub pv_patches: Mutex<Vec<PersistentVolume>>,
    pub restore_patches: AtomicUsize,
    pub pvc_reads: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    /// Simulated latency of PVC/PV reads
    pub read_delay: Duration,
}

impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_read_delay(delay: Duration) -> Self {
        Self {
            read_delay: delay,
            ..Self::default()
        }
    }

    pub fn add_restore(&self, restore: Restore) {
        self.restores
            .lock()
            .unwrap()
            .insert(restore.name_any(), restore);
    }

    pub fn restore(&self, name: &str) -> Restore {
        self.restores.lock().unwrap()[name].clone()
    }

    /// Register a backup and its local storage location
    pub fn add_backup(&self, name: &str) {
        let mut backup = Backup::new(
            name,
            BackupSpec {
                storage_location: LOCATION.to_string(),
            },
        );
        backup.metadata.namespace = Some(NAMESPACE.to_string());
        self.backups.lock().unwrap().insert(name.to_string(), backup);
        self.add_location();
    }

    pub fn add_location(&self) {
        let mut location = BackupStorageLocation::new(
            LOCATION,
            BackupStorageLocationSpec {
                provider: "local".to_string(),
                object_storage: ObjectStorageLocation {
                    bucket: "backups".to_string(),
                    prefix: None,
                },
                config: BTreeMap::new(),
            },
        );
        location.metadata.namespace = Some(NAMESPACE.to_string());
        self.locations
            .lock()
            .unwrap()
            .insert(LOCATION.to_string(), location);
    }

    pub fn add_pvc(&self, pvc: PersistentVolumeClaim) {
        let key = format!("{}/{}", pvc.namespace().unwrap_or_default(), pvc.name_any());
        self.pvcs.lock().unwrap().insert(key, pvc);
    }

    pub fn add_pv(&self, pv: PersistentVolume) {
        self.pvs.lock().unwrap().insert(pv.name_any(), pv);
    }

    pub fn pv(&self, name: &str) -> PersistentVolume {
        self.pvs.lock().unwrap()[name].clone()
    }

    pub fn pv_patch_count(&self) -> usize {
        self.pv_patches.lock().unwrap().len()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn track_read(&self) {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        if !self.read_delay.is_zero() {
            tokio::time::sleep(self.read_delay).await;
        } else {
            tokio::task::yield_now().await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

pub fn api_error(code: u16) -> Error {
    Error::Kube(kube::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message: format!("injected {}", code),
        reason: "Injected".to_string(),
        code,
    }))
}

#[async_trait]
impl ClusterClient for FakeCluster {
    async fn get_restore(&self, _namespace: &str, name: &str) -> Result<Option<Restore>> {
        Ok(self.restores.lock().unwrap().get(name).cloned())
    }

    async fn patch_restore(&self, _original: &Restore, updated: &Restore) -> Result<()> {
        self.restore_patches.fetch_add(1, Ordering::SeqCst);
        self.add_restore(updated.clone());
        Ok(())
    }

    async fn get_backup(&self, _namespace: &str, name: &str) -> Result<Option<Backup>> {
        Ok(self.backups.lock().unwrap().get(name).cloned())
    }

    async fn get_backup_storage_location(
        &self,
        _namespace: &str,
        name: &str,
    ) -> Result<Option<BackupStorageLocation>> {
        Ok(self.locations.lock().unwrap().get(name).cloned())
    }

    async fn get_pvc(&self, namespace: &str, name: &str) -> Result<Option<PersistentVolumeClaim>> {
        self.pvc_reads.fetch_add(1, Ordering::SeqCst);
        self.track_read().await;
        if let Some(code) = self.pvc_failures.lock().unwrap().pop_front() {
            return Err(api_error(code));
        }
        let key = format!("{}/{}", namespace, name);
        Ok(self.pvcs.lock().unwrap().get(&key).cloned())
    }

    async fn get_pv(&self, name: &str) -> Result<Option<PersistentVolume>> {
        self.track_read().await;
        Ok(self.pvs.lock().unwrap().get(name).cloned())
    }

    async fn patch_pv(&self, _original: &PersistentVolume, updated: &PersistentVolume) -> Result<()> {
        if let Some(code) = self.pv_patch_failures.lock().unwrap().get(&updated.name_any()) {
            return Err(api_error(*code));
        }
        self.pv_patches.lock().unwrap().push(updated.clone());
        self.add_pv(updated.clone());
        Ok(())
    }
}

// ============================================================================
// Fake backup store
// ============================================================================

#[derive(Default)]
pub struct FakeBackupStore {
    pub volume_infos: Vec<VolumeInfo>,
    pub resource_list: RestoredResourceList,
    pub results: Mutex<HashMap<String, Results>>,
    pub puts: AtomicUsize,
}

impl FakeBackupStore {
    pub fn new(volume_infos: Vec<VolumeInfo>, created_pvcs: &[&str]) -> Self {
        let mut resource_list = RestoredResourceList::new();
        resource_list.insert(
            "v1/PersistentVolumeClaim".to_string(),
            created_pvcs.iter().map(|p| format!("{}(created)", p)).collect(),
        );
        Self {
            volume_infos,
            resource_list,
            ..Self::default()
        }
    }

    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    pub fn stored(&self, key: &str) -> Results {
        self.results
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl BackupStore for FakeBackupStore {
    async fn get_backup_volume_infos(&self, _backup_name: &str) -> Result<Vec<VolumeInfo>> {
        Ok(self.volume_infos.clone())
    }

    async fn get_restored_resource_list(&self, _restore_name: &str) -> Result<RestoredResourceList> {
        Ok(self.resource_list.clone())
    }

    async fn get_restore_results(&self, _restore_name: &str) -> Result<HashMap<String, Results>> {
        Ok(self.results.lock().unwrap().clone())
    }

    async fn put_restore_results(
        &self,
        _restore_name: &str,
        results: &HashMap<String, Results>,
    ) -> Result<()> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        *self.results.lock().unwrap() = results.clone();
        Ok(())
    }
}

pub struct FakeStoreGetter(pub Arc<FakeBackupStore>);

#[async_trait]
impl BackupStoreGetter for FakeStoreGetter {
    async fn get(
        &self,
        _location: &BackupStorageLocation,
        _plugins: &dyn PluginManager,
    ) -> Result<Arc<dyn BackupStore>> {
        Ok(self.0.clone())
    }
}

struct CountingPluginManager(Arc<AtomicUsize>);

impl PluginManager for CountingPluginManager {
    fn cleanup_clients(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// Plugin manager factory and the number of cleanups it has seen
pub fn counting_plugins() -> (PluginManagerFactory, Arc<AtomicUsize>) {
    let cleanups = Arc::new(AtomicUsize::new(0));
    let counter = cleanups.clone();
    let factory: PluginManagerFactory = Arc::new(move || {
        Box::new(CountingPluginManager(counter.clone())) as Box<dyn PluginManager>
    });
    (factory, cleanups)
}

// ============================================================================
// Object builders
// ============================================================================

pub fn restore(name: &str, phase: RestorePhase) -> Restore {
    let mut restore = Restore::new(
        name,
        RestoreSpec {
            backup_name: BACKUP.to_string(),
            schedule_name: Some("nightly".to_string()),
            namespace_mapping: BTreeMap::new(),
        },
    );
    restore.metadata.namespace = Some(NAMESPACE.to_string());
    restore.status = Some(RestoreStatus {
        phase,
        ..RestoreStatus::default()
    });
    restore
}

pub fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

pub fn volume_info(namespace: &str, pvc: &str, pv: &str, method: BackupMethod) -> VolumeInfo {
    VolumeInfo {
        backup_method: method,
        pvc_name: pvc.to_string(),
        pvc_namespace: namespace.to_string(),
        pv_name: pv.to_string(),
        pv_info: Some(PvInfo {
            reclaim_policy: ReclaimPolicy::Retain,
            labels: labels(&[("tier", "gold")]),
        }),
    }
}

pub fn pvc(namespace: &str, name: &str, volume: Option<&str>, phase: &str) -> PersistentVolumeClaim {
    PersistentVolumeClaim {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        spec: Some(PersistentVolumeClaimSpec {
            volume_name: volume.map(str::to_string),
            ..Default::default()
        }),
        status: Some(PersistentVolumeClaimStatus {
            phase: Some(phase.to_string()),
            ..Default::default()
        }),
    }
}

pub fn bound_pvc(namespace: &str, name: &str, volume: &str) -> PersistentVolumeClaim {
    pvc(namespace, name, Some(volume), "Bound")
}

pub fn pv(
    name: &str,
    claim: Option<(&str, &str)>,
    phase: &str,
    policy: &str,
    pv_labels: &[(&str, &str)],
) -> PersistentVolume {
    PersistentVolume {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            labels: Some(labels(pv_labels)),
            ..Default::default()
        },
        spec: Some(PersistentVolumeSpec {
            persistent_volume_reclaim_policy: Some(policy.to_string()),
            claim_ref: claim.map(|(namespace, claim_name)| ObjectReference {
                name: Some(claim_name.to_string()),
                namespace: Some(namespace.to_string()),
                kind: Some("PersistentVolumeClaim".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }),
        status: Some(PersistentVolumeStatus {
            phase: Some(phase.to_string()),
            ..Default::default()
        }),
    }
}

pub fn bound_pv(
    name: &str,
    namespace: &str,
    claim: &str,
    policy: &str,
    pv_labels: &[(&str, &str)],
) -> PersistentVolume {
    pv(name, Some((namespace, claim)), "Bound", policy, pv_labels)
}

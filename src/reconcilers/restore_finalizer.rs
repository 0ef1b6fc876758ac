//! Restore finalizer reconciler
//!
//! Drives restores in a finalizing phase to their terminal phase:
//! - Backup and storage location resolution
//! - Loading volume info and the restored-resource inventory
//! - Running finalization tasks
//! - Persisting warnings/errors and patching the final status

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info};

use crate::cluster::ClusterClient;
use crate::config::FinalizerConfig;
use crate::crd::{BackupStorageLocation, Restore, RestorePhase};
use crate::error::{Error, Result};
use crate::metrics;
use crate::persistence::{
    BackupStore, BackupStoreGetter, PluginManager, PluginManagerGuard, ERRORS_KEY, WARNINGS_KEY,
};
use crate::results::Results;

use super::inventory::restored_pvcs;
use super::tasks::{FinalizerContext, TaskExecutor, TaskOutcome};

/// Creates a fresh plugin manager for each reconciliation
pub type PluginManagerFactory = Arc<dyn Fn() -> Box<dyn PluginManager> + Send + Sync>;

/// Finalizes restores living in one namespace
pub struct RestoreFinalizer {
    cluster: Arc<dyn ClusterClient>,
    namespace: String,
    new_plugin_manager: PluginManagerFactory,
    store_getter: Arc<dyn BackupStoreGetter>,
    executor: TaskExecutor,
    config: FinalizerConfig,
}

impl RestoreFinalizer {
    pub fn new(
        cluster: Arc<dyn ClusterClient>,
        namespace: impl Into<String>,
        new_plugin_manager: PluginManagerFactory,
        store_getter: Arc<dyn BackupStoreGetter>,
    ) -> Self {
        Self {
            cluster,
            namespace: namespace.into(),
            new_plugin_manager,
            store_getter,
            executor: TaskExecutor::default(),
            config: FinalizerConfig::default(),
        }
    }

    /// Replace the registered finalization tasks
    pub fn with_executor(mut self, executor: TaskExecutor) -> Self {
        self.executor = executor;
        self
    }

    pub fn with_config(mut self, config: FinalizerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Finalize the named restore
    ///
    /// Returns the terminal phase that was committed, or `None` when the
    /// restore is missing or not awaiting finalization. An `Err` leaves the
    /// restore in its finalizing phase for a later attempt.
    pub async fn reconcile(&self, name: &str) -> Result<Option<RestorePhase>> {
        let key = format!("{}/{}", self.namespace, name);
        debug!(restore = %key, "Getting restore for finalization");

        let Some(original) = self.cluster.get_restore(&self.namespace, name).await? else {
            error!(restore = %key, "Restore not found");
            return Ok(None);
        };
        let mut restore = original.clone();

        let phase = restore.status.as_ref().map(|s| s.phase).unwrap_or_default();
        if !phase.is_finalizing() {
            debug!(restore = %key, phase = %phase, "Restore is not awaiting finalization, skipping");
            return Ok(None);
        }

        let location = match self.fetch_backup_location(&restore.spec.backup_name).await {
            Ok(location) => location,
            Err(e) if e.is_not_found() => {
                error!(restore = %key, error = %e, "Backup not found, skipping finalization tasks");
                self.finish_processing(RestorePhase::PartiallyFailed, &mut restore, &original)
                    .await?;
                return Ok(Some(RestorePhase::PartiallyFailed));
            }
            Err(e) => {
                error!(restore = %key, error = %e, "Error getting backup info");
                return Err(e);
            }
        };

        let plugins = PluginManagerGuard::new((self.new_plugin_manager)());
        let store = self.store_getter.get(&location, plugins.manager()).await?;

        let backup_name = restore.spec.backup_name.clone();
        let volume_infos = store.get_backup_volume_infos(&backup_name).await?;
        let resource_list = store.get_restored_resource_list(name).await?;

        let ctx = FinalizerContext {
            restore: restore.clone(),
            cluster: self.cluster.clone(),
            volume_infos,
            restored_pvcs: restored_pvcs(&resource_list),
            config: self.config,
        };
        let outcome = self.executor.execute(&ctx).await?;

        let warning_count = outcome.warnings.count();
        let error_count = outcome.errors.count();
        let status = restore.status.get_or_insert_with(Default::default);
        status.warnings = status.warnings.saturating_add(to_u32(warning_count));
        status.errors = status.errors.saturating_add(to_u32(error_count));
        if !outcome.errors.is_empty() {
            status.phase = RestorePhase::FinalizingPartiallyFailed;
        }
        let final_phase = status.phase.finalized();

        if warning_count > 0 || error_count > 0 {
            update_results(store.as_ref(), name, &outcome).await?;
        }

        info!(
            restore = %key,
            phase = %final_phase,
            warnings = warning_count,
            errors = error_count,
            "Marking restore finalized"
        );
        self.finish_processing(final_phase, &mut restore, &original)
            .await?;

        Ok(Some(final_phase))
    }

    /// Resolve the storage location of the restore's backup
    async fn fetch_backup_location(&self, backup_name: &str) -> Result<BackupStorageLocation> {
        let backup = self
            .cluster
            .get_backup(&self.namespace, backup_name)
            .await?
            .ok_or_else(|| {
                Error::BackupNotFound(format!("{}/{}", self.namespace, backup_name))
            })?;

        let location_name = &backup.spec.storage_location;
        self.cluster
            .get_backup_storage_location(&self.namespace, location_name)
            .await?
            .ok_or_else(|| {
                Error::BackupNotFound(format!(
                    "storage location {}/{} of backup {}",
                    self.namespace, location_name, backup_name
                ))
            })
    }

    /// Commit a terminal phase with a single status patch
    async fn finish_processing(
        &self,
        phase: RestorePhase,
        restore: &mut Restore,
        original: &Restore,
    ) -> Result<()> {
        let schedule = restore.spec.schedule_name.clone().unwrap_or_default();
        let status = restore.status.get_or_insert_with(Default::default);

        if phase == RestorePhase::PartiallyFailed {
            status.phase = RestorePhase::PartiallyFailed;
            metrics::record_restore_partial_failure(&schedule);
        } else {
            status.phase = RestorePhase::Completed;
            metrics::record_restore_success(&schedule);
        }
        status.completion_timestamp = Some(Utc::now());

        self.cluster.patch_restore(original, restore).await.map_err(|e| {
            error!(error = %e, "Error updating restore's final status");
            e
        })
    }
}

/// Merge new warnings/errors into the results already stored for the restore
async fn update_results(
    store: &dyn BackupStore,
    restore_name: &str,
    outcome: &TaskOutcome,
) -> Result<()> {
    let mut stored = store.get_restore_results(restore_name).await?;

    let mut warnings = stored.remove(WARNINGS_KEY).unwrap_or_default();
    let mut errors = stored.remove(ERRORS_KEY).unwrap_or_default();
    warnings.merge(&outcome.warnings);
    errors.merge(&outcome.errors);

    let merged: HashMap<String, Results> = HashMap::from([
        (WARNINGS_KEY.to_string(), warnings),
        (ERRORS_KEY.to_string(), errors),
    ]);
    store
        .put_restore_results(restore_name, &merged)
        .await
        .map_err(|e| Error::storage(format!("error putting restore results: {}", e)))
}

fn to_u32(count: usize) -> u32 {
    u32::try_from(count).unwrap_or(u32::MAX)
}

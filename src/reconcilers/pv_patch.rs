//! Re-apply preserved PV settings to dynamically provisioned volumes
//!
//! Volumes restored through pod volume backup or CSI snapshots get a new PV
//! from the storage provisioner, losing the reclaim policy and labels of the
//! original. Once the restored PVC and its new PV are bound, the recorded
//! settings are patched back onto the PV.
//!
//! At most [`MAX_CONCURRENT_PV_PATCHES`] volumes are processed at a time.
//! Each volume polls on its own deadline; failures are collected per
//! restored namespace and never stop the other volumes.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use k8s_openapi::api::core::v1::PersistentVolume;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::cluster::ClusterClient;
use crate::config::{FinalizerConfig, MAX_CONCURRENT_PV_PATCHES};
use crate::error::{Error, Result};
use crate::metrics;
use crate::results::Results;
use crate::volume::PvInfo;

use super::tasks::{FinalizationTask, FinalizerContext, TaskOutcome};

const PHASE_BOUND: &str = "Bound";

/// Finalization task patching newly provisioned PVs from volume info
#[derive(Debug, Default, Clone, Copy)]
pub struct PatchDynamicPvTask;

/// One restored volume to patch
#[derive(Debug, Clone)]
pub struct PatchTarget {
    pub pvc_name: String,
    /// Namespace the PVC was restored into, after remapping
    pub pvc_namespace: String,
    /// Name of the original PV, for reporting
    pub pv_name: String,
    pub pv_info: PvInfo,
}

/// Where a volume stands after one poll attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchStep {
    /// PVC missing, or not yet bound to a volume
    AwaitingPvcBound,
    /// PV missing, or not yet bound to a claim
    AwaitingPvBound { pv_name: String },
    /// PV was patched to match the recorded settings
    Patched { pv_name: String },
    /// PV already matched the recorded settings
    AlreadyMatching { pv_name: String },
}

impl PatchStep {
    pub fn is_done(&self) -> bool {
        matches!(
            self,
            PatchStep::Patched { .. } | PatchStep::AlreadyMatching { .. }
        )
    }
}

#[async_trait]
impl FinalizationTask for PatchDynamicPvTask {
    fn name(&self) -> &str {
        "patch-dynamic-pv"
    }

    async fn run(&self, ctx: &FinalizerContext) -> Result<TaskOutcome> {
        let targets = patch_targets(ctx);
        info!(volumes = targets.len(), "Patching newly dynamically provisioned PVs starts");

        let errors = patch_all(ctx.cluster.clone(), targets, ctx.config).await?;

        info!(errors = errors.count(), "Patching newly dynamically provisioned PVs ends");
        Ok(TaskOutcome {
            warnings: Results::new(),
            errors,
        })
    }
}

/// Volumes whose recorded PV settings should be re-applied
pub fn patch_targets(ctx: &FinalizerContext) -> Vec<PatchTarget> {
    ctx.volume_infos
        .iter()
        .filter_map(|volume| {
            let pv_info = volume.patchable_pv_info()?;
            let namespace = ctx.restore.spec.restored_namespace(&volume.pvc_namespace);
            let key = format!("{}/{}", namespace, volume.pvc_name);
            if !ctx.restored_pvcs.contains(&key) {
                return None;
            }
            Some(PatchTarget {
                pvc_name: volume.pvc_name.clone(),
                pvc_namespace: namespace.to_string(),
                pv_name: volume.pv_name.clone(),
                pv_info: pv_info.clone(),
            })
        })
        .collect()
}

/// Patch every target with bounded concurrency and wait for all of them
pub async fn patch_all(
    cluster: Arc<dyn ClusterClient>,
    targets: Vec<PatchTarget>,
    config: FinalizerConfig,
) -> Result<Results> {
    let errors = Arc::new(Mutex::new(Results::new()));
    let gate = Arc::new(Semaphore::new(MAX_CONCURRENT_PV_PATCHES));
    let mut workers = JoinSet::new();

    for target in targets {
        let cluster = cluster.clone();
        let gate = gate.clone();
        let errors = errors.clone();

        workers.spawn(async move {
            let _permit = gate
                .acquire_owned()
                .await
                .map_err(|e| Error::task(format!("PV patch gate closed: {}", e)))?;

            debug!(
                pvc = %target.pvc_name,
                pvc_namespace = %target.pvc_namespace,
                "Patching dynamic PV is in progress"
            );

            if let Err(e) = patch_with_deadline(cluster.as_ref(), &target, &config).await {
                metrics::PV_PATCHES.with_label_values(&["failed"]).inc();
                let message = format!(
                    "fail to patch dynamic PV, err: {}, PVC: {}, PV: {}",
                    e, target.pvc_name, target.pv_name
                );
                error!(
                    pvc = %target.pvc_name,
                    pvc_namespace = %target.pvc_namespace,
                    pv = %target.pv_name,
                    error = %e,
                    "Error patching dynamic PV using volume info"
                );
                errors
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .add(&target.pvc_namespace, message);
            }
            Ok::<(), Error>(())
        });
    }

    let mut failure = None;
    while let Some(joined) = workers.join_next().await {
        let outcome = joined
            .map_err(|e| Error::task(format!("PV patch worker failed: {}", e)))
            .and_then(|r| r);
        if let Err(e) = outcome {
            failure.get_or_insert(e);
        }
    }
    if let Some(e) = failure {
        return Err(e);
    }

    let errors = errors.lock().unwrap_or_else(PoisonError::into_inner).clone();
    Ok(errors)
}

/// Poll one volume until patched, failing once the deadline passes
pub async fn patch_with_deadline(
    cluster: &dyn ClusterClient,
    target: &PatchTarget,
    config: &FinalizerConfig,
) -> Result<PatchStep> {
    let poll = poll_until_patched(cluster, target, config);
    match tokio::time::timeout(config.pv_patch_timeout, poll).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout(config.pv_patch_timeout)),
    }
}

/// Check immediately, then once per interval, for a bounded number of attempts
async fn poll_until_patched(
    cluster: &dyn ClusterClient,
    target: &PatchTarget,
    config: &FinalizerConfig,
) -> Result<PatchStep> {
    let attempts = config.pv_patch_attempts();

    for attempt in 1..=attempts {
        let step = check_and_patch(cluster, target).await?;
        if step.is_done() {
            let outcome = match step {
                PatchStep::Patched { .. } => "patched",
                _ => "unchanged",
            };
            metrics::PV_PATCHES.with_label_values(&[outcome]).inc();
            return Ok(step);
        }

        debug!(
            pvc = %target.pvc_name,
            pvc_namespace = %target.pvc_namespace,
            attempt,
            step = ?step,
            "Volume not ready for patching"
        );
        if attempt < attempts {
            tokio::time::sleep(config.pv_patch_poll_interval).await;
        }
    }

    Err(Error::Timeout(config.pv_patch_timeout))
}

/// Run one pass of the per-volume state machine
///
/// The PVC is checked before the PV, and the PV before any patch. A PV bound
/// to a different claim is a permanent failure.
pub async fn check_and_patch(
    cluster: &dyn ClusterClient,
    target: &PatchTarget,
) -> Result<PatchStep> {
    let pvc = cluster.get_pvc(&target.pvc_namespace, &target.pvc_name).await;
    let pvc = match retry_on_transient(pvc)? {
        Some(Some(pvc)) => pvc,
        _ => return Ok(PatchStep::AwaitingPvcBound),
    };

    let pvc_bound = pvc.status.as_ref().and_then(|s| s.phase.as_deref()) == Some(PHASE_BOUND);
    let pv_name = pvc
        .spec
        .as_ref()
        .and_then(|s| s.volume_name.clone())
        .filter(|name| !name.is_empty());
    let pv_name = match pv_name {
        Some(name) if pvc_bound => name,
        _ => return Ok(PatchStep::AwaitingPvcBound),
    };

    let pv = match retry_on_transient(cluster.get_pv(&pv_name).await)? {
        Some(Some(pv)) => pv,
        _ => return Ok(PatchStep::AwaitingPvBound { pv_name }),
    };

    let pv_bound = pv.status.as_ref().and_then(|s| s.phase.as_deref()) == Some(PHASE_BOUND);
    let claim = pv.spec.as_ref().and_then(|s| s.claim_ref.as_ref());
    let claim = match claim {
        Some(claim) if pv_bound => claim,
        _ => return Ok(PatchStep::AwaitingPvBound { pv_name }),
    };

    let claim_name = claim.name.as_deref().unwrap_or_default();
    let claim_namespace = claim.namespace.as_deref().unwrap_or_default();
    if claim_name != target.pvc_name || claim_namespace != target.pvc_namespace {
        return Err(Error::UnexpectedClaim {
            actual: format!("{}/{}", claim_namespace, claim_name),
            expected: format!("{}/{}", target.pvc_namespace, target.pvc_name),
        });
    }

    if !needs_patch(&pv, &target.pv_info) {
        return Ok(PatchStep::AlreadyMatching { pv_name });
    }

    let updated = apply_pv_info(&pv, &target.pv_info);
    cluster.patch_pv(&pv, &updated).await?;
    info!(
        pv = %pv_name,
        pvc = %target.pvc_name,
        pvc_namespace = %target.pvc_namespace,
        "Newly dynamically provisioned PV has been patched using volume info"
    );
    Ok(PatchStep::Patched { pv_name })
}

/// Map retryable API failures to `None` so the caller polls again
fn retry_on_transient<T>(result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_retryable() => {
            warn!(error = %e, "Transient error while waiting for volume, retrying");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Whether the PV's reclaim policy or labels differ from the recorded ones
///
/// Labels on the PV that were not recorded are ignored.
pub fn needs_patch(pv: &PersistentVolume, pv_info: &PvInfo) -> bool {
    let reclaim_policy = pv
        .spec
        .as_ref()
        .and_then(|s| s.persistent_volume_reclaim_policy.as_deref());
    if reclaim_policy != Some(pv_info.reclaim_policy.as_str()) {
        return true;
    }

    let labels = pv.metadata.labels.as_ref();
    pv_info
        .labels
        .iter()
        .any(|(key, value)| labels.and_then(|l| l.get(key)) != Some(value))
}

/// Copy of the PV carrying the recorded reclaim policy and label set
pub fn apply_pv_info(pv: &PersistentVolume, pv_info: &PvInfo) -> PersistentVolume {
    let mut updated = pv.clone();
    updated.metadata.labels = Some(pv_info.labels.clone());
    updated
        .spec
        .get_or_insert_with(Default::default)
        .persistent_volume_reclaim_policy = Some(pv_info.reclaim_policy.as_str().to_string());
    updated
}

//! Finalization tasks and their executor
//!
//! Tasks run in registration order against a [`FinalizerContext`] built once
//! per reconciliation. Each task reports problems as [`Results`] entries;
//! an `Err` from a task is reserved for framework failures.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::cluster::ClusterClient;
use crate::config::FinalizerConfig;
use crate::crd::Restore;
use crate::error::Result;
use crate::results::Results;
use crate::volume::VolumeInfo;

use super::pv_patch::PatchDynamicPvTask;

/// Everything a finalization task may read for one restore
pub struct FinalizerContext {
    /// Snapshot of the restore taken at the start of reconciliation
    pub restore: Restore,
    pub cluster: Arc<dyn ClusterClient>,
    pub volume_infos: Vec<VolumeInfo>,
    /// PVCs created by the main restore phase, as `namespace/name`
    pub restored_pvcs: HashSet<String>,
    pub config: FinalizerConfig,
}

/// Warnings and errors produced by finalization
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskOutcome {
    pub warnings: Results,
    pub errors: Results,
}

impl TaskOutcome {
    pub fn merge(&mut self, other: &TaskOutcome) {
        self.warnings.merge(&other.warnings);
        self.errors.merge(&other.errors);
    }
}

/// A post-processing step run while a restore is finalizing
#[async_trait]
pub trait FinalizationTask: Send + Sync {
    /// Name for logging
    fn name(&self) -> &str;

    async fn run(&self, ctx: &FinalizerContext) -> Result<TaskOutcome>;
}

/// Runs registered finalization tasks in order
#[derive(Clone)]
pub struct TaskExecutor {
    tasks: Vec<Arc<dyn FinalizationTask>>,
}

impl Default for TaskExecutor {
    fn default() -> Self {
        Self::new(vec![Arc::new(PatchDynamicPvTask)])
    }
}

impl TaskExecutor {
    pub fn new(tasks: Vec<Arc<dyn FinalizationTask>>) -> Self {
        Self { tasks }
    }

    /// Names of the registered tasks, in execution order
    pub fn task_names(&self) -> Vec<&str> {
        self.tasks.iter().map(|t| t.name()).collect()
    }

    /// Run every task and merge their outcomes
    pub async fn execute(&self, ctx: &FinalizerContext) -> Result<TaskOutcome> {
        let mut outcome = TaskOutcome::default();
        for task in &self.tasks {
            debug!(task = task.name(), "Running finalization task");
            let result = task.run(ctx).await?;
            outcome.merge(&result);
        }
        Ok(outcome)
    }
}

//! Restore Custom Resource Definition

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Restore resource specification
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "backup.oso.sh",
    version = "v1",
    kind = "Restore",
    plural = "restores",
    singular = "restore",
    shortname = "rst",
    namespaced,
    status = "RestoreStatus",
    printcolumn = r#"{"name": "Backup", "type": "string", "jsonPath": ".spec.backupName"}"#,
    printcolumn = r#"{"name": "Phase", "type": "string", "jsonPath": ".status.phase"}"#,
    printcolumn = r#"{"name": "Warnings", "type": "integer", "jsonPath": ".status.warnings"}"#,
    printcolumn = r#"{"name": "Errors", "type": "integer", "jsonPath": ".status.errors"}"#,
    printcolumn = r#"{"name": "Age", "type": "date", "jsonPath": ".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct RestoreSpec {
    /// Name of the Backup to restore from
    pub backup_name: String,

    /// Schedule that produced the backup, used as the metrics label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule_name: Option<String>,

    /// Namespace remapping (source -> target)
    #[serde(default)]
    pub namespace_mapping: BTreeMap<String, String>,
}

impl RestoreSpec {
    /// Namespace a source namespace was restored into
    pub fn restored_namespace<'a>(&'a self, namespace: &'a str) -> &'a str {
        self.namespace_mapping
            .get(namespace)
            .map(String::as_str)
            .unwrap_or(namespace)
    }
}

/// Restore lifecycle phase
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum RestorePhase {
    #[default]
    New,
    InProgress,
    /// Items restored, post-processing pending
    Finalizing,
    /// Items restored with errors, post-processing pending
    FinalizingPartiallyFailed,
    Completed,
    PartiallyFailed,
    Failed,
}

impl RestorePhase {
    /// Whether the finalizer owns a restore in this phase
    pub fn is_finalizing(self) -> bool {
        matches!(
            self,
            RestorePhase::Finalizing | RestorePhase::FinalizingPartiallyFailed
        )
    }

    /// Terminal phase reached from this finalizing phase
    pub fn finalized(self) -> RestorePhase {
        match self {
            RestorePhase::FinalizingPartiallyFailed => RestorePhase::PartiallyFailed,
            _ => RestorePhase::Completed,
        }
    }
}

impl fmt::Display for RestorePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RestorePhase::New => "New",
            RestorePhase::InProgress => "InProgress",
            RestorePhase::Finalizing => "Finalizing",
            RestorePhase::FinalizingPartiallyFailed => "FinalizingPartiallyFailed",
            RestorePhase::Completed => "Completed",
            RestorePhase::PartiallyFailed => "PartiallyFailed",
            RestorePhase::Failed => "Failed",
        };
        f.write_str(s)
    }
}

/// Restore status
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RestoreStatus {
    /// Current phase
    #[serde(default)]
    pub phase: RestorePhase,

    /// Cumulative warning count
    #[serde(default)]
    pub warnings: u32,

    /// Cumulative error count
    #[serde(default)]
    pub errors: u32,

    /// Time the restore reached a terminal phase
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_timestamp: Option<DateTime<Utc>>,
}

//! Volume information captured at backup time

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

/// How a volume's data was captured
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub enum BackupMethod {
    PodVolumeBackup,
    #[serde(rename = "CSISnapshot")]
    CsiSnapshot,
    NativeSnapshot,
    #[default]
    #[serde(other)]
    Unknown,
}

impl BackupMethod {
    /// Whether volumes captured this way are re-provisioned dynamically on restore
    pub fn is_dynamically_restored(self) -> bool {
        matches!(self, BackupMethod::PodVolumeBackup | BackupMethod::CsiSnapshot)
    }
}

/// PV reclaim policy
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub enum ReclaimPolicy {
    Retain,
    #[default]
    Delete,
    Recycle,
}

impl ReclaimPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            ReclaimPolicy::Retain => "Retain",
            ReclaimPolicy::Delete => "Delete",
            ReclaimPolicy::Recycle => "Recycle",
        }
    }
}

/// Settings of the original PV that dynamic provisioning would lose
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PvInfo {
    pub reclaim_policy: ReclaimPolicy,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub labels: BTreeMap<String, String>,
}

/// Records written with a nil map carry an explicit `null`
fn null_as_empty<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::deserialize(deserializer)?.unwrap_or_default())
}

/// One record per volume in a backup
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeInfo {
    #[serde(default)]
    pub backup_method: BackupMethod,
    #[serde(default)]
    pub pvc_name: String,
    #[serde(default)]
    pub pvc_namespace: String,
    #[serde(default)]
    pub pv_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pv_info: Option<PvInfo>,
}

impl VolumeInfo {
    /// Original PV settings, if this volume is a candidate for re-applying them
    pub fn patchable_pv_info(&self) -> Option<&PvInfo> {
        if self.backup_method.is_dynamically_restored() {
            self.pv_info.as_ref()
        } else {
            None
        }
    }
}

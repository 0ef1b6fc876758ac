//! Backup and BackupStorageLocation Custom Resource Definitions
//!
//! Only the fields the finalizer needs to locate backup metadata are modeled.

use std::collections::BTreeMap;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Backup resource specification
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "backup.oso.sh",
    version = "v1",
    kind = "Backup",
    plural = "backups",
    singular = "backup",
    shortname = "bkp",
    namespaced,
    printcolumn = r#"{"name": "Location", "type": "string", "jsonPath": ".spec.storageLocation"}"#,
    printcolumn = r#"{"name": "Age", "type": "date", "jsonPath": ".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct BackupSpec {
    /// BackupStorageLocation holding this backup's data
    pub storage_location: String,
}

/// BackupStorageLocation resource specification
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "backup.oso.sh",
    version = "v1",
    kind = "BackupStorageLocation",
    plural = "backupstoragelocations",
    singular = "backupstoragelocation",
    shortname = "bsl",
    namespaced,
    printcolumn = r#"{"name": "Provider", "type": "string", "jsonPath": ".spec.provider"}"#,
    printcolumn = r#"{"name": "Bucket", "type": "string", "jsonPath": ".spec.objectStorage.bucket"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct BackupStorageLocationSpec {
    /// Object store provider name (e.g. local)
    pub provider: String,

    /// Bucket and prefix inside the object store
    pub object_storage: ObjectStorageLocation,

    /// Provider-specific configuration
    #[serde(default)]
    pub config: BTreeMap<String, String>,
}

/// Object storage coordinates
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ObjectStorageLocation {
    /// Bucket name
    pub bucket: String,

    /// Key prefix inside the bucket
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
}

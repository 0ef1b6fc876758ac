//! Custom Resource Definitions for the Restore Finalizer Operator

mod backup;
mod restore;

pub use backup::*;
pub use restore::*;

use kube::CustomResourceExt;

/// Generate all CRD YAML manifests
pub fn generate_crds() -> Vec<String> {
    vec![
        serde_yaml::to_string(&Restore::crd()).unwrap(),
        serde_yaml::to_string(&Backup::crd()).unwrap(),
        serde_yaml::to_string(&BackupStorageLocation::crd()).unwrap(),
    ]
}

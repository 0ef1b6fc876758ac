//! Kubernetes controllers for the Restore Finalizer Operator
//!
//! This module contains the controller wiring that watches Restore changes
//! and triggers finalization.

mod restore_finalizer_controller;

pub use restore_finalizer_controller::{requeue_after, run as run_restore_finalizer_controller};

use std::sync::Arc;

use kube::Client;

use crate::cluster::KubeClusterClient;
use crate::config::OperatorArgs;
use crate::persistence::{LocalBackupStoreGetter, LocalPluginManager, PluginManager};
use crate::reconcilers::{PluginManagerFactory, RestoreFinalizer};

/// Shared context for all controllers
pub struct Context {
    /// Restore finalizer
    pub finalizer: RestoreFinalizer,
}

impl Context {
    /// Create a new context
    pub fn new(finalizer: RestoreFinalizer) -> Self {
        Self { finalizer }
    }

    /// Build a context backed by the API server and the local object store
    pub fn from_args(client: Client, args: &OperatorArgs) -> Self {
        let plugins: PluginManagerFactory =
            Arc::new(|| Box::new(LocalPluginManager) as Box<dyn PluginManager>);
        let finalizer = RestoreFinalizer::new(
            Arc::new(KubeClusterClient::new(client)),
            args.namespace.clone(),
            plugins,
            Arc::new(LocalBackupStoreGetter::new(args.backup_store_root.clone())),
        )
        .with_config(args.finalizer_config());

        Self::new(finalizer)
    }
}

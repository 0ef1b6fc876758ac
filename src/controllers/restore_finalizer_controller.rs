//! Restore finalizer controller
//!
//! Watches Restore resources in the operator namespace and finalizes those
//! awaiting finalization.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use kube::{
    api::ListParams,
    runtime::{
        controller::{Action, Controller},
        watcher::Config as WatcherConfig,
    },
    Api, Client, ResourceExt,
};
use tracing::{debug, error, info, instrument};

use crate::controllers::Context;
use crate::crd::Restore;
use crate::error::{Error, Result};
use crate::metrics;

const KIND: &str = "Restore";

/// Run the Restore finalizer controller
pub async fn run(client: Client, context: Arc<Context>) {
    let api: Api<Restore> = Api::namespaced(client, context.finalizer.namespace());

    // Verify CRD is installed
    if let Err(e) = api.list(&ListParams::default().limit(1)).await {
        error!("Restore CRD not installed: {}", e);
        return;
    }

    info!(namespace = context.finalizer.namespace(), "Starting Restore finalizer controller");

    Controller::new(api, WatcherConfig::default())
        .shutdown_on_signal()
        .run(reconcile, error_policy, context)
        .for_each(|result| async move {
            match result {
                Ok((obj, _action)) => {
                    debug!(name = %obj.name, "Reconciled Restore");
                }
                Err(e) => {
                    error!(error = %e, "Reconciliation error");
                    metrics::RECONCILIATION_ERRORS.with_label_values(&[KIND]).inc();
                }
            }
        })
        .await;
}

/// Main reconciliation function
#[instrument(skip(ctx), fields(name = %obj.name_any(), namespace = obj.namespace()))]
async fn reconcile(obj: Arc<Restore>, ctx: Arc<Context>) -> Result<Action> {
    let _timer = metrics::RECONCILE_DURATION
        .with_label_values(&[KIND])
        .start_timer();
    metrics::RECONCILIATIONS.with_label_values(&[KIND]).inc();

    if let Some(phase) = ctx.finalizer.reconcile(&obj.name_any()).await? {
        info!(name = %obj.name_any(), phase = %phase, "Restore finalized");
    }

    Ok(Action::await_change())
}

/// Error policy for the controller
fn error_policy(obj: Arc<Restore>, error: &Error, _ctx: Arc<Context>) -> Action {
    error!(
        name = %obj.name_any(),
        error = %error,
        "Finalization failed, scheduling retry"
    );

    Action::requeue(requeue_after(error))
}

/// Requeue delay for a failed finalization
pub fn requeue_after(error: &Error) -> Duration {
    match error {
        Error::Kube(_) => Duration::from_secs(30),
        Error::Config(_) | Error::Validation(_) => Duration::from_secs(300),
        Error::Storage(_) | Error::BackupNotFound(_) => Duration::from_secs(60),
        _ => Duration::from_secs(30),
    }
}

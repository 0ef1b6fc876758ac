//! Reconcilers for restore finalization
//!
//! This module contains the business logic run once a restore's items have
//! been created:
//! - Deciding which restores are awaiting finalization
//! - Running ordered finalization tasks
//! - Recording warnings/errors and committing the terminal phase

pub mod inventory;
pub mod pv_patch;
pub mod restore_finalizer;
pub mod tasks;

pub use restore_finalizer::{PluginManagerFactory, RestoreFinalizer};
pub use tasks::{FinalizationTask, FinalizerContext, TaskExecutor, TaskOutcome};

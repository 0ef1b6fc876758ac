//! Restore Finalizer Kubernetes Operator
//!
//! Finalizes restores once their items have been created: re-applies the
//! preserved reclaim policy and labels to dynamically provisioned volumes,
//! records warnings/errors, and commits the restore's terminal phase.

pub mod cluster;
pub mod config;
pub mod controllers;
pub mod crd;
pub mod error;
pub mod metrics;
pub mod persistence;
pub mod reconcilers;
pub mod results;
pub mod volume;

pub use error::{Error, Result};

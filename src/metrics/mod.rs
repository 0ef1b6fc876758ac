//! Prometheus metrics for the Restore Finalizer Operator
//!
//! This module exposes metrics for monitoring finalization outcomes and
//! operator health.

mod prometheus;

pub use prometheus::*;

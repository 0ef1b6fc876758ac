//! Operator configuration
//!
//! Command-line flags with environment variable fallbacks, plus the tuning
//! knobs of the finalization tasks.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

/// Interval between readiness checks of a restored volume
pub const DEFAULT_PV_PATCH_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Deadline for re-applying settings to one restored volume
pub const DEFAULT_PV_PATCH_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Maximum number of volumes patched concurrently
pub const MAX_CONCURRENT_PV_PATCHES: usize = 3;

/// Command-line configuration for the operator binary
#[derive(Debug, Clone, Parser)]
#[command(name = "restore-finalizer-operator", version, about)]
pub struct OperatorArgs {
    /// Namespace holding Restore, Backup and BackupStorageLocation resources
    #[arg(long, env = "OPERATOR_NAMESPACE", default_value = "backup-system")]
    pub namespace: String,

    /// Port for the metrics and health server
    #[arg(long, env = "METRICS_PORT", default_value_t = 8080)]
    pub metrics_port: u16,

    /// Root directory of the local object store
    #[arg(long, env = "BACKUP_STORE_ROOT", default_value = "/data")]
    pub backup_store_root: PathBuf,

    /// Seconds between volume readiness checks
    #[arg(
        long,
        env = "PV_PATCH_POLL_INTERVAL_SECS",
        default_value_t = 10,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub pv_patch_poll_interval_secs: u64,

    /// Seconds allowed for patching one volume
    #[arg(
        long,
        env = "PV_PATCH_TIMEOUT_SECS",
        default_value_t = 600,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub pv_patch_timeout_secs: u64,
}

impl OperatorArgs {
    pub fn finalizer_config(&self) -> FinalizerConfig {
        FinalizerConfig {
            pv_patch_poll_interval: Duration::from_secs(self.pv_patch_poll_interval_secs),
            pv_patch_timeout: Duration::from_secs(self.pv_patch_timeout_secs),
        }
    }
}

/// Timing of the volume patch poll loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinalizerConfig {
    pub pv_patch_poll_interval: Duration,
    pub pv_patch_timeout: Duration,
}

impl Default for FinalizerConfig {
    fn default() -> Self {
        Self {
            pv_patch_poll_interval: DEFAULT_PV_PATCH_POLL_INTERVAL,
            pv_patch_timeout: DEFAULT_PV_PATCH_TIMEOUT,
        }
    }
}

impl FinalizerConfig {
    /// Number of checks that fit in the deadline, the first one immediate
    pub fn pv_patch_attempts(&self) -> u32 {
        let interval = self.pv_patch_poll_interval.as_millis().max(1);
        let attempts = self.pv_patch_timeout.as_millis().div_ceil(interval);
        attempts.clamp(1, u32::MAX as u128) as u32
    }
}

//! Error types for the Restore Finalizer Operator

use thiserror::Error;

/// Result type alias using the operator's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Operator error types
#[derive(Error, Debug)]
pub enum Error {
    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Backup store error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Backup or its storage location not found
    #[error("Backup not found: {0}")]
    BackupNotFound(String),

    /// PV bound to a claim other than the restored PVC
    #[error(
        "PV was bound by unexpected PVC, unexpected PVC: {actual}, expected PVC: {expected}"
    )]
    UnexpectedClaim { actual: String, expected: String },

    /// Polling deadline elapsed
    #[error("timed out after {0:?} waiting for the condition")]
    Timeout(std::time::Duration),

    /// Finalization task failed at the framework level
    #[error("Finalization task error: {0}")]
    Task(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    /// Create a storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        Error::Storage(msg.into())
    }

    /// Create a task error
    pub fn task(msg: impl Into<String>) -> Self {
        Error::Task(msg.into())
    }

    /// Check if this error indicates a not-found condition
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::Kube(kube::Error::Api(e)) => e.code == 404,
            Error::BackupNotFound(_) => true,
            _ => false,
        }
    }

    /// Check if this error is a transient API failure worth retrying
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Kube(kube::Error::Api(e)) => e.code >= 500 || e.code == 429,
            Error::Kube(kube::Error::Service(_)) => true,
            _ => false,
        }
    }
}

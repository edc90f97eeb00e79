//! Error types for handle lifecycle, persistence and supervision

use std::path::PathBuf;
use thiserror::Error;

use crate::save::SaveAttempt;

/// A single call through a remote object proxy failed
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    /// Proxy no longer reaches its remote object
    #[error("Proxy disconnected from remote object: {what}")]
    Disconnected { what: String },

    /// Remote call returned an error
    #[error("Remote call {operation} failed: {reason}")]
    CallFailed { operation: String, reason: String },

    /// Host does not offer this capability
    #[error("Unsupported by host: {0}")]
    Unsupported(String),
}

impl RemoteError {
    /// Shorthand for [`RemoteError::CallFailed`]
    pub fn call_failed(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CallFailed {
            operation: operation.into(),
            reason: reason.into(),
        }
    }
}

/// Persisting the composed document failed
#[derive(Debug, Error)]
pub enum SaveError {
    /// Output location could not be prepared
    #[error("Failed to prepare output path {}: {source}", .path.display())]
    Prepare {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Every save strategy was tried and none produced the file
    #[error("All save strategies failed for {} ({} attempts)", .path.display(), .attempts.len())]
    AllStrategiesFailed {
        path: PathBuf,
        attempts: Vec<SaveAttempt>,
    },
}

/// Why a supervised run did not complete
#[derive(Debug, Error)]
pub enum SupervisionError {
    /// The workload returned an error
    #[error("Work failed: {0:#}")]
    Work(#[from] anyhow::Error),

    /// The workload panicked
    #[error("Work panicked: {0}")]
    Panicked(String),

    /// The workload observed cancellation or was aborted
    #[error("Work cancelled")]
    Cancelled,
}

/// Configuration result type
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config load error: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Validation error: {0}")]
    Validation(String),
}

//! Errors raised while launching, signalling and reaping the document host

use std::io;
use thiserror::Error;

/// Host process errors
#[derive(Debug, Error)]
pub enum ProcessError {
    /// Spawning, waiting on or signalling the host failed at the OS level
    #[error("Host process I/O failed: {0}")]
    Io(#[from] io::Error),

    /// The host quit before its settle period ended
    #[error("Host {command} exited during startup: {status}")]
    ExitedEarly { command: String, status: String },

    /// The host was still running when the wait bound ran out
    #[error("Host PID {pid} still running after {waited_ms}ms")]
    ExitTimeout { pid: u32, waited_ms: u64 },

    /// Graceful close request could not be delivered
    #[error("Failed to request close of PID {pid}: {reason}")]
    CloseFailed { pid: u32, reason: String },

    /// Forced termination was refused
    #[error("Failed to kill PID {pid}: {reason}")]
    KillFailed { pid: u32, reason: String },

    #[error("Invalid host configuration: {0}")]
    InvalidConfig(String),

    /// No such process, usually because it already exited
    #[error("No process with PID {pid}")]
    NotFound { pid: u32 },
}

impl ProcessError {
    /// Whether the error means the target process no longer exists
    pub fn is_gone(&self) -> bool {
        matches!(self, ProcessError::NotFound { .. })
    }
}

/// Result type for host process operations
pub type Result<T> = std::result::Result<T, ProcessError>;

//! Host launch and watchdog configuration

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for launching the document host
#[derive(Debug, Clone)]
pub struct HostLaunchConfig {
    /// Host executable
    pub command: String,
    /// Command arguments
    pub args: Vec<String>,
    /// Working directory (None = current dir)
    pub working_dir: Option<PathBuf>,
    /// Environment variables (added to parent env)
    pub env: HashMap<String, String>,
    /// How long the host gets to stabilize after creation
    pub settle: Duration,
    /// Bound on waiting for exit after a kill
    pub shutdown_timeout: Duration,
}

impl HostLaunchConfig {
    /// Create new launch configuration
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: vec![],
            working_dir: None,
            env: HashMap::new(),
            settle: Duration::from_secs(2),
            shutdown_timeout: Duration::from_secs(5),
        }
    }

    /// Set command arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Set working directory
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Add environment variable
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set the post-launch settle time
    pub fn settle(mut self, duration: Duration) -> Self {
        self.settle = duration;
        self
    }

    /// Set the shutdown wait bound
    pub fn shutdown_timeout(mut self, duration: Duration) -> Self {
        self.shutdown_timeout = duration;
        self
    }
}

/// Timing knobs for [`ProcessWatchdog`](crate::ProcessWatchdog)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchdogConfig {
    /// How long matches get to exit after a graceful close request
    pub grace_period: Duration,
    /// Liveness polling interval during the grace period
    pub poll_interval: Duration,
    /// Wait after a forced kill before confirming it took effect
    pub kill_settle: Duration,
}

impl WatchdogConfig {
    /// Set the grace period
    pub fn grace_period(mut self, duration: Duration) -> Self {
        self.grace_period = duration;
        self
    }

    /// Set the polling interval
    pub fn poll_interval(mut self, duration: Duration) -> Self {
        self.poll_interval = duration;
        self
    }

    /// Set the post-kill settle time
    pub fn kill_settle(mut self, duration: Duration) -> Self {
        self.kill_settle = duration;
        self
    }
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            grace_period: Duration::from_secs(2),
            poll_interval: Duration::from_millis(100),
            kill_settle: Duration::from_millis(200),
        }
    }
}

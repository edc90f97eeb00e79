//! A host instance started by [`HostLauncher`](crate::HostLauncher)

use std::process::ExitStatus;
use std::time::Duration;

use tokio::process::Child;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::config::HostLaunchConfig;
use crate::error::{ProcessError, Result};
use crate::table::send_close;

/// Pause between the group-wide close request and the group-wide kill
const GROUP_KILL_DELAY: Duration = Duration::from_millis(200);

/// Running host launched by this process
pub struct HostChild {
    child: Child,
    config: HostLaunchConfig,
    pid: u32,
}

impl HostChild {
    pub(crate) fn new(child: Child, config: HostLaunchConfig) -> Result<Self> {
        let pid = child.id().ok_or_else(|| ProcessError::ExitedEarly {
            command: config.command.clone(),
            status: "exited before its PID could be read".to_string(),
        })?;
        Ok(Self { child, config, pid })
    }

    /// OS process ID
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Launch configuration
    pub fn config(&self) -> &HostLaunchConfig {
        &self.config
    }

    /// Whether the host has not exited yet. Reaps it if it has.
    pub fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Exit status if the host already exited
    pub(crate) fn exit_status(&mut self) -> Option<ExitStatus> {
        self.child.try_wait().ok().flatten()
    }

    /// Wait for exit, giving up after the configured shutdown timeout
    pub async fn wait(&mut self) -> Result<ExitStatus> {
        self.wait_at_most(self.config.shutdown_timeout).await
    }

    async fn wait_at_most(&mut self, bound: Duration) -> Result<ExitStatus> {
        match timeout(bound, self.child.wait()).await {
            Ok(status) => Ok(status?),
            Err(_) => Err(ProcessError::ExitTimeout {
                pid: self.pid,
                waited_ms: bound.as_millis() as u64,
            }),
        }
    }

    /// Ask the host to close, then kill its tree if it is still up after
    /// the shutdown timeout.
    pub async fn shutdown(&mut self) -> Result<()> {
        if !self.is_running() {
            debug!(pid = self.pid, "Host already exited");
            return Ok(());
        }

        match send_close(self.pid) {
            Ok(()) => debug!(pid = self.pid, "Requested host close"),
            Err(e) => warn!(pid = self.pid, error = %e, "Close request failed"),
        }

        match self.wait().await {
            Ok(status) => {
                info!(pid = self.pid, status = %status, "Host closed");
                Ok(())
            }
            Err(ProcessError::ExitTimeout { .. }) => {
                warn!(pid = self.pid, "Host ignored close request, killing its process tree");
                self.kill_tree().await
            }
            Err(e) => Err(e),
        }
    }

    /// Kill the host together with every helper it spawned.
    ///
    /// Unix signals the host's process group (SIGTERM, then SIGKILL for
    /// anything left); Windows runs `taskkill /f /t`.
    pub async fn kill_tree(&mut self) -> Result<()> {
        debug!(pid = self.pid, "Killing host process tree");
        self.signal_tree().await;

        if self.is_running() {
            self.child.kill().await.map_err(|e| ProcessError::KillFailed {
                pid: self.pid,
                reason: e.to_string(),
            })?;
        }

        let status = self.wait().await?;
        info!(pid = self.pid, status = %status, "Host process tree killed");
        Ok(())
    }

    #[cfg(unix)]
    async fn signal_tree(&mut self) {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        let group = Pid::from_raw(self.pid as i32);
        if let Err(e) = killpg(group, Signal::SIGTERM) {
            warn!(pid = self.pid, error = %e, "Could not signal host process group");
            return;
        }

        sleep(GROUP_KILL_DELAY).await;
        // Helpers may outlive the host itself, so the group is killed either way
        if let Err(e) = killpg(group, Signal::SIGKILL) {
            debug!(pid = self.pid, error = %e, "Host process group already gone");
        }
    }

    #[cfg(windows)]
    async fn signal_tree(&mut self) {
        let result = tokio::process::Command::new("taskkill")
            .args(["/pid", &self.pid.to_string(), "/f", "/t"])
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .await;

        match result {
            Ok(status) if status.success() => {}
            Ok(status) => warn!(pid = self.pid, status = %status, "taskkill reported failure"),
            Err(e) => warn!(pid = self.pid, error = %e, "Could not run taskkill"),
        }
        sleep(GROUP_KILL_DELAY).await;
    }
}

//! Host launcher - starts the document host and waits for it to settle

use std::process::Stdio;
use tokio::process::Command;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::{
    child::HostChild,
    config::HostLaunchConfig,
    error::{ProcessError, Result},
};

/// Launches host application instances
pub struct HostLauncher;

impl HostLauncher {
    /// Create new host launcher
    pub fn new() -> Self {
        Self
    }

    /// Spawn the host and wait out its settle period.
    ///
    /// The host runs in its own process group on Unix so that
    /// [`HostChild::kill_tree`] reaches helper processes it starts.
    ///
    /// # Examples
    /// ```no_run
    /// use deckhand_process::{HostLauncher, HostLaunchConfig};
    ///
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let launcher = HostLauncher::new();
    /// let config = HostLaunchConfig::new("soffice").args(["--headless"]);
    /// let host = launcher.launch(config).await?;
    /// launcher.shutdown(host).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn launch(&self, config: HostLaunchConfig) -> Result<HostChild> {
        if config.command.trim().is_empty() {
            return Err(ProcessError::InvalidConfig(
                "host command must not be empty".to_string(),
            ));
        }

        debug!(
            command = %config.command,
            args = ?config.args,
            "Launching host process"
        );

        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args);

        if let Some(ref dir) = config.working_dir {
            cmd.current_dir(dir);
        }

        for (key, value) in &config.env {
            cmd.env(key, value);
        }

        // GUI hosts have nothing useful on stdio
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::null());
        cmd.stderr(Stdio::null());

        // Dropping the handle on an error path must not orphan the host
        cmd.kill_on_drop(true);

        #[cfg(unix)]
        cmd.process_group(0);

        let child = cmd.spawn()?;
        let mut host = HostChild::new(child, config)?;
        info!(pid = %host.pid(), command = %host.config().command, "Host process spawned");

        let settle = host.config().settle;
        if !settle.is_zero() {
            debug!(pid = %host.pid(), settle_ms = settle.as_millis() as u64, "Waiting for host to settle");
            sleep(settle).await;
        }

        if let Some(status) = host.exit_status() {
            warn!(pid = %host.pid(), status = %status, "Host exited during settle period");
            return Err(ProcessError::ExitedEarly {
                command: host.config().command.clone(),
                status: status.to_string(),
            });
        }

        Ok(host)
    }

    /// Gracefully shutdown a host
    pub async fn shutdown(&self, mut host: HostChild) -> Result<()> {
        host.shutdown().await
    }

    /// Kill a host and every process in its group
    pub async fn kill_tree(&self, mut host: HostChild) -> Result<()> {
        host.kill_tree().await
    }
}

impl Default for HostLauncher {
    fn default() -> Self {
        Self::new()
    }
}

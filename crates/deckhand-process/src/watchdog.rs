//! Watchdog for host processes that refuse to exit
//!
//! Escalation per matching instance: graceful close request, a bounded wait for
//! natural exit, then a forced kill. Each step is fault-tolerant: a failure on
//! one instance is logged and recorded, and processing moves on to the rest.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::config::WatchdogConfig;
use crate::table::{ProcessEntry, ProcessTable, SystemProcessTable};

/// How a matched process ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminationOutcome {
    /// Exited within the grace period after the close request
    ExitedGracefully,
    /// Survived the grace period and was killed
    Killed,
    /// Still running after every attempt
    Failed { reason: String },
}

/// Result of one [`ProcessWatchdog::ensure_terminated`] pass
#[derive(Debug, Clone, Default)]
pub struct TerminationReport {
    /// Name that was searched for
    pub process_name: String,
    /// One outcome per matched process
    pub outcomes: Vec<(ProcessEntry, TerminationOutcome)>,
}

impl TerminationReport {
    /// Number of processes that matched
    pub fn matched(&self) -> usize {
        self.outcomes.len()
    }

    /// True when no match is known to have survived
    pub fn converged(&self) -> bool {
        self.failures().next().is_none()
    }

    /// Matches that could not be terminated
    pub fn failures(&self) -> impl Iterator<Item = &(ProcessEntry, TerminationOutcome)> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| matches!(outcome, TerminationOutcome::Failed { .. }))
    }

    /// Number of matches that needed a forced kill
    pub fn killed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| *outcome == TerminationOutcome::Killed)
            .count()
    }
}

/// Something that can guarantee a named host is gone.
///
/// The supervisor depends on this rather than on [`ProcessWatchdog`] directly.
#[async_trait]
pub trait Terminator: Send + Sync {
    /// Terminate every process named `process_name`
    async fn ensure_terminated(&self, process_name: &str) -> TerminationReport;
}

/// Detects and terminates host instances that fail to exit cleanly
pub struct ProcessWatchdog<T = SystemProcessTable> {
    table: T,
    config: WatchdogConfig,
}

impl ProcessWatchdog<SystemProcessTable> {
    /// Create a watchdog over the local OS process table
    pub fn new(config: WatchdogConfig) -> Self {
        Self::with_table(SystemProcessTable::new(), config)
    }
}

impl<T: ProcessTable> ProcessWatchdog<T> {
    /// Create a watchdog over a custom process table
    pub fn with_table(table: T, config: WatchdogConfig) -> Self {
        Self { table, config }
    }

    /// Get the underlying process table
    pub fn table(&self) -> &T {
        &self.table
    }

    /// Get the watchdog configuration
    pub fn config(&self) -> &WatchdogConfig {
        &self.config
    }

    /// Make sure no process named `process_name` remains.
    ///
    /// Best-effort: processes that cannot be terminated are reported as
    /// [`TerminationOutcome::Failed`] and logged, never escalated further.
    pub async fn ensure_terminated(&self, process_name: &str) -> TerminationReport {
        let mut report = TerminationReport {
            process_name: process_name.to_string(),
            outcomes: Vec::new(),
        };

        let matches = self.table.find(process_name);
        if matches.is_empty() {
            debug!(process = %process_name, "No host processes to terminate");
            return report;
        }

        info!(
            process = %process_name,
            count = matches.len(),
            "Terminating host processes"
        );

        for entry in &matches {
            match self.table.request_close(entry.pid) {
                Ok(()) => debug!(pid = entry.pid, "Requested graceful close"),
                Err(e) => warn!(pid = entry.pid, error = %e, "Graceful close request failed"),
            }
        }

        let survivors = self.wait_for_exit(&matches).await;

        for entry in &matches {
            if !survivors.contains(&entry.pid) {
                info!(pid = entry.pid, "Host process exited gracefully");
                report
                    .outcomes
                    .push((entry.clone(), TerminationOutcome::ExitedGracefully));
            }
        }

        let mut killed = Vec::new();
        for entry in matches.iter().filter(|e| survivors.contains(&e.pid)) {
            warn!(pid = entry.pid, "Host process ignored close request, killing");
            match self.table.force_kill(entry.pid) {
                Ok(()) => killed.push(entry),
                Err(e) if e.is_gone() => {
                    info!(pid = entry.pid, "Host process exited before it was killed");
                    report
                        .outcomes
                        .push((entry.clone(), TerminationOutcome::ExitedGracefully));
                }
                Err(e) => {
                    warn!(pid = entry.pid, error = %e, "Forced kill failed");
                    report.outcomes.push((
                        entry.clone(),
                        TerminationOutcome::Failed {
                            reason: e.to_string(),
                        },
                    ));
                }
            }
        }

        if !killed.is_empty() {
            sleep(self.config.kill_settle).await;
        }

        for entry in killed {
            if self.table.is_alive(entry.pid) {
                warn!(pid = entry.pid, "Host process still running after forced kill");
                report.outcomes.push((
                    entry.clone(),
                    TerminationOutcome::Failed {
                        reason: "still running after forced kill".to_string(),
                    },
                ));
            } else {
                info!(pid = entry.pid, "Host process killed");
                report.outcomes.push((entry.clone(), TerminationOutcome::Killed));
            }
        }

        if report.converged() {
            info!(
                process = %process_name,
                matched = report.matched(),
                killed = report.killed(),
                "Host processes terminated"
            );
        } else {
            warn!(
                process = %process_name,
                failed = report.failures().count(),
                "Some host processes could not be terminated"
            );
        }

        report
    }

    /// Poll until every entry has exited or the grace period runs out.
    /// Returns the PIDs still alive.
    async fn wait_for_exit(&self, entries: &[ProcessEntry]) -> Vec<u32> {
        let deadline = Instant::now() + self.config.grace_period;
        let interval = self.config.poll_interval.max(Duration::from_millis(1));
        let mut alive: Vec<u32> = entries.iter().map(|e| e.pid).collect();

        loop {
            alive.retain(|pid| self.table.is_alive(*pid));
            let now = Instant::now();
            if alive.is_empty() || now >= deadline {
                return alive;
            }
            sleep(interval.min(deadline - now)).await;
        }
    }
}

#[async_trait]
impl<T: ProcessTable> Terminator for ProcessWatchdog<T> {
    async fn ensure_terminated(&self, process_name: &str) -> TerminationReport {
        ProcessWatchdog::ensure_terminated(self, process_name).await
    }
}

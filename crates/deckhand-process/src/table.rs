//! OS process enumeration and signalling

use parking_lot::Mutex;
use sysinfo::{Pid, ProcessStatus, System};
use tracing::debug;

use crate::error::{ProcessError, Result};

/// A running process that matched a lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessEntry {
    /// OS process ID
    pub pid: u32,
    /// Executable name as reported by the OS
    pub name: String,
}

/// Access to the OS process table.
///
/// The watchdog only talks to processes through this trait, which keeps the
/// escalation logic testable without real host instances.
pub trait ProcessTable: Send + Sync {
    /// List live processes whose name matches `name`
    fn find(&self, name: &str) -> Vec<ProcessEntry>;

    /// Ask a process to exit on its own terms
    fn request_close(&self, pid: u32) -> Result<()>;

    /// Terminate a process unconditionally
    fn force_kill(&self, pid: u32) -> Result<()>;

    /// Whether the process still exists (zombies count as gone)
    fn is_alive(&self, pid: u32) -> bool;
}

/// Compare a reported executable name against the configured host name.
///
/// Case-insensitive, and a trailing `.exe` on either side is ignored so that
/// `POWERPNT` matches `POWERPNT.EXE`.
pub fn matches_process_name(candidate: &str, wanted: &str) -> bool {
    fn stem(name: &str) -> &str {
        let trimmed = name.trim();
        let split = trimmed
            .len()
            .checked_sub(4)
            .and_then(|cut| trimmed.get(cut..).map(|ext| (cut, ext)));
        match split {
            Some((cut, ext)) if cut > 0 && ext.eq_ignore_ascii_case(".exe") => &trimmed[..cut],
            _ => trimmed,
        }
    }

    let wanted = stem(wanted);
    !wanted.is_empty() && stem(candidate).eq_ignore_ascii_case(wanted)
}

#[cfg(unix)]
pub(crate) fn send_close(pid: u32) -> Result<()> {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid as NixPid;

    kill(NixPid::from_raw(pid as i32), Signal::SIGTERM).map_err(|e| ProcessError::CloseFailed {
        pid,
        reason: e.to_string(),
    })
}

#[cfg(windows)]
pub(crate) fn send_close(pid: u32) -> Result<()> {
    // Without /f taskkill posts WM_CLOSE, which GUI hosts treat as a normal close.
    let status = std::process::Command::new("taskkill")
        .args(["/pid", &pid.to_string()])
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map_err(|e| ProcessError::CloseFailed {
            pid,
            reason: e.to_string(),
        })?;

    if status.success() {
        Ok(())
    } else {
        Err(ProcessError::CloseFailed {
            pid,
            reason: format!("taskkill exited with {}", status),
        })
    }
}

/// [`ProcessTable`] backed by `sysinfo`
pub struct SystemProcessTable {
    system: Mutex<System>,
    own_pid: Option<u32>,
}

impl SystemProcessTable {
    /// Create a table over the local OS
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
            own_pid: sysinfo::get_current_pid().ok().map(|pid| pid.as_u32()),
        }
    }
}

impl Default for SystemProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessTable for SystemProcessTable {
    fn find(&self, name: &str) -> Vec<ProcessEntry> {
        let mut system = self.system.lock();
        system.refresh_processes();

        let mut found: Vec<ProcessEntry> = system
            .processes()
            .values()
            .filter(|process| process.status() != ProcessStatus::Zombie)
            .filter(|process| matches_process_name(process.name(), name))
            .map(|process| ProcessEntry {
                pid: process.pid().as_u32(),
                name: process.name().to_string(),
            })
            .filter(|entry| Some(entry.pid) != self.own_pid)
            .collect();
        found.sort_by_key(|entry| entry.pid);

        debug!(name = %name, matches = found.len(), "Enumerated host processes");
        found
    }

    fn request_close(&self, pid: u32) -> Result<()> {
        send_close(pid)
    }

    fn force_kill(&self, pid: u32) -> Result<()> {
        let mut system = self.system.lock();
        let sys_pid = Pid::from_u32(pid);
        if !system.refresh_process(sys_pid) {
            return Err(ProcessError::NotFound { pid });
        }

        match system.process(sys_pid) {
            Some(process) if process.kill() => Ok(()),
            Some(_) => Err(ProcessError::KillFailed {
                pid,
                reason: "OS refused to terminate the process".to_string(),
            }),
            None => Err(ProcessError::NotFound { pid }),
        }
    }

    fn is_alive(&self, pid: u32) -> bool {
        let mut system = self.system.lock();
        let sys_pid = Pid::from_u32(pid);
        if !system.refresh_process(sys_pid) {
            return false;
        }
        system
            .process(sys_pid)
            .map(|process| process.status() != ProcessStatus::Zombie)
            .unwrap_or(false)
    }
}

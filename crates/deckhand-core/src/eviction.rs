//! Aging batch release
//!
//! Long compositions create thousands of proxies. Trimming the oldest ones at
//! section boundaries bounds the registry without touching the handles
//! created most recently, which are the ones still likely to be in use.

use tracing::debug;

use crate::registry::ReleaseReport;
use crate::session::Session;

/// Releases the oldest handles once a session grows past a threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgingBatchReleaser {
    trigger_at: usize,
    keep_recent: usize,
}

impl AgingBatchReleaser {
    /// Create a releaser that trims down to `keep_recent` handles once
    /// `trigger_at` are tracked. `keep_recent` is capped at `trigger_at`.
    pub fn new(trigger_at: usize, keep_recent: usize) -> Self {
        Self {
            trigger_at,
            keep_recent: keep_recent.min(trigger_at),
        }
    }

    /// Tracked count at which trimming starts
    pub fn trigger_at(&self) -> usize {
        self.trigger_at
    }

    /// Handles left tracked after a trim
    pub fn keep_recent(&self) -> usize {
        self.keep_recent
    }

    /// Trim `session` if it has reached the trigger.
    ///
    /// Returns `None` when below the threshold. A paused session yields a
    /// deferred report and keeps every handle.
    pub fn trim(&self, session: &Session) -> Option<ReleaseReport> {
        let count = session.count();
        if count < self.trigger_at || count == 0 {
            return None;
        }

        let excess = count - self.keep_recent;
        debug!(
            session = %session.id(),
            tracked = count,
            releasing = excess,
            "Trimming aged handles"
        );
        Some(session.release_oldest(excess))
    }
}

impl Default for AgingBatchReleaser {
    fn default() -> Self {
        Self::new(200, 50)
    }
}

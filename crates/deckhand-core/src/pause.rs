//! Pause gate for batch release
//!
//! Nested critical sections compose: the gate opens only when the outermost
//! section resumes.

use tracing::{debug, warn};

use crate::session::Session;

/// Depth-counted pause state
#[derive(Debug, Default)]
pub struct PauseGate {
    depth: usize,
}

impl PauseGate {
    /// Create an open gate
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter a critical section, returning the new depth
    pub fn pause(&mut self) -> usize {
        self.depth += 1;
        self.depth
    }

    /// Leave a critical section.
    ///
    /// Returns the new depth, or `None` when there was no matching pause.
    pub fn resume(&mut self) -> Option<usize> {
        if self.depth == 0 {
            return None;
        }
        self.depth -= 1;
        Some(self.depth)
    }

    /// Whether batch release is currently held
    pub fn is_paused(&self) -> bool {
        self.depth > 0
    }

    /// Current nesting depth
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Force the gate open, returning the depth it had
    pub fn reset(&mut self) -> usize {
        std::mem::take(&mut self.depth)
    }
}

/// Holds a session's batch release paused until dropped
#[must_use = "batch release resumes as soon as the guard is dropped"]
pub struct PauseGuard<'a> {
    session: &'a Session,
}

impl<'a> PauseGuard<'a> {
    pub(crate) fn new(session: &'a Session) -> Self {
        session.pause();
        Self { session }
    }
}

impl Drop for PauseGuard<'_> {
    fn drop(&mut self) {
        self.session.resume();
    }
}

pub(crate) fn log_transition(session_id: &str, depth: usize, paused: bool) {
    if paused {
        debug!(session = %session_id, depth, "Batch release paused");
    } else {
        debug!(session = %session_id, depth, "Batch release resumed");
    }
}

pub(crate) fn log_unbalanced_resume(session_id: &str) {
    warn!(session = %session_id, "Resume without matching pause ignored");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_pause_needs_matching_resumes() {
        let mut gate = PauseGate::new();
        gate.pause();
        gate.pause();

        assert_eq!(gate.resume(), Some(1));
        assert!(gate.is_paused());
        assert_eq!(gate.resume(), Some(0));
        assert!(!gate.is_paused());
    }

    #[test]
    fn test_unbalanced_resume_saturates() {
        let mut gate = PauseGate::new();
        assert_eq!(gate.resume(), None);
        assert_eq!(gate.depth(), 0);
    }

    #[test]
    fn test_reset_reports_previous_depth() {
        let mut gate = PauseGate::new();
        gate.pause();
        gate.pause();
        assert_eq!(gate.reset(), 2);
        assert!(!gate.is_paused());
    }
}

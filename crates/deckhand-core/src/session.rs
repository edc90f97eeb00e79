//! Per-run handle session
//!
//! A [`Session`] owns the handle registry and the pause gate for one
//! generation run. Release passes check the gate and drain the registry under
//! the state lock, then call into the remote objects with that lock dropped.
//! A separate pass lock serializes release passes with [`Session::pause`], so
//! once `pause` returns no release call is in flight or can start.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::RemoteError;
use crate::pause::{self, PauseGate, PauseGuard};
use crate::pin::PinGuard;
use crate::registry::{release_records, HandleId, HandleRegistry, ReleaseReport};
use crate::remote::RemoteHandle;

/// Called after a full release pass so the automation layer can drop
/// whatever proxies it still caches for released objects.
pub type CollectionHook = Arc<dyn Fn() -> Result<(), RemoteError> + Send + Sync>;

#[derive(Default)]
struct SessionState {
    registry: HandleRegistry,
    gate: PauseGate,
}

/// Handle lifecycle state for one generation run
pub struct Session {
    id: String,
    state: Mutex<SessionState>,
    // Lock order: `release_pass` before `state`
    release_pass: Mutex<()>,
    live_pins: AtomicUsize,
    collector: Option<CollectionHook>,
}

impl Session {
    /// Create a session with a fresh ID
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            state: Mutex::new(SessionState::default()),
            release_pass: Mutex::new(()),
            live_pins: AtomicUsize::new(0),
            collector: None,
        }
    }

    /// Attach a collection hook run after every full release
    pub fn with_collector(mut self, hook: CollectionHook) -> Self {
        self.collector = Some(hook);
        self
    }

    /// Session ID
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Track a handle for later release
    pub fn track<H: RemoteHandle + 'static>(&self, handle: Arc<H>) -> HandleId {
        let handle: Arc<dyn RemoteHandle> = handle;
        let what = handle.describe();
        let id = self.state.lock().registry.track(handle);
        debug!(session = %self.id, handle = %id, what = %what, "Tracked handle");
        id
    }

    /// Number of tracked handles
    pub fn count(&self) -> usize {
        self.state.lock().registry.len()
    }

    /// Sequence numbers of tracked handles, oldest first
    pub fn tracked_ids(&self) -> Vec<HandleId> {
        self.state.lock().registry.ids()
    }

    /// Release every tracked handle and request a collection pass.
    ///
    /// A no-op while paused. Otherwise the registry is empty afterwards even
    /// if individual releases failed.
    pub fn release_all(&self) -> ReleaseReport {
        let report = {
            let _pass = self.release_pass.lock();
            let records = {
                let mut state = self.state.lock();
                if state.gate.is_paused() {
                    debug!(
                        session = %self.id,
                        tracked = state.registry.len(),
                        "Release all deferred while paused"
                    );
                    return ReleaseReport::deferred();
                }
                state.registry.drain_all()
            };
            release_records(records)
        };

        info!(
            session = %self.id,
            attempted = report.attempted,
            released = report.released,
            failed = report.failed,
            "Released all handles"
        );
        self.collect();
        report
    }

    /// Release the `n` oldest handles. A no-op while paused.
    pub fn release_oldest(&self, n: usize) -> ReleaseReport {
        let report = {
            let _pass = self.release_pass.lock();
            let records = {
                let mut state = self.state.lock();
                if state.gate.is_paused() {
                    debug!(session = %self.id, requested = n, "Batch release deferred while paused");
                    return ReleaseReport::deferred();
                }
                state.registry.drain_oldest(n)
            };
            release_records(records)
        };

        debug!(
            session = %self.id,
            requested = n,
            released = report.released,
            failed = report.failed,
            remaining = self.count(),
            "Released oldest handles"
        );
        report
    }

    /// Hold batch release.
    ///
    /// Waits for a release pass already in flight to finish.
    pub fn pause(&self) {
        let _pass = self.release_pass.lock();
        let depth = self.state.lock().gate.pause();
        pause::log_transition(&self.id, depth, true);
    }

    /// Release one level of pause
    pub fn resume(&self) {
        let resumed = self.state.lock().gate.resume();
        match resumed {
            Some(depth) => pause::log_transition(&self.id, depth, false),
            None => pause::log_unbalanced_resume(&self.id),
        }
    }

    /// Whether batch release is held
    pub fn is_paused(&self) -> bool {
        self.state.lock().gate.is_paused()
    }

    /// Current pause nesting depth
    pub fn pause_depth(&self) -> usize {
        self.state.lock().gate.depth()
    }

    /// Pause batch release until the returned guard is dropped
    pub fn hold(&self) -> PauseGuard<'_> {
        PauseGuard::new(self)
    }

    /// Add an external reference to `handle` for the lifetime of the guard
    pub fn pin<H: RemoteHandle + ?Sized>(&self, handle: Arc<H>) -> Result<PinGuard<'_, H>, RemoteError> {
        let refs = handle.add_ref().map_err(|e| {
            warn!(session = %self.id, what = %handle.describe(), error = %e, "Failed to pin handle");
            e
        })?;
        self.live_pins.fetch_add(1, Ordering::SeqCst);
        debug!(session = %self.id, what = %handle.describe(), refs, "Pinned handle");
        Ok(PinGuard::new(handle, self))
    }

    /// Pins currently held through this session
    pub fn pinned_count(&self) -> usize {
        self.live_pins.load(Ordering::SeqCst)
    }

    pub(crate) fn note_unpinned(&self) {
        self.live_pins.fetch_sub(1, Ordering::SeqCst);
    }

    /// End-of-run cleanup: open the gate and release everything.
    pub fn teardown(&self) -> ReleaseReport {
        let leftover = self.state.lock().gate.reset();
        if leftover > 0 {
            warn!(session = %self.id, depth = leftover, "Tearing down with batch release still paused");
        }
        self.release_all()
    }

    fn collect(&self) {
        if let Some(ref hook) = self.collector {
            match hook() {
                Ok(()) => debug!(session = %self.id, "Collection pass requested"),
                Err(e) => warn!(session = %self.id, error = %e, "Collection pass failed"),
            }
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("tracked", &self.count())
            .field("pause_depth", &self.pause_depth())
            .field("pins", &self.pinned_count())
            .finish()
    }
}

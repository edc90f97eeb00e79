//! Property-based tests for the session handle lifecycle
//!
//! **Property 1: At-most-once release intent**
//! **Property 2: Pause exclusion**
//! **Property 3: FIFO eviction**

use std::sync::Arc;

use deckhand_core::{RemoteError, RemoteHandle, Session};
use parking_lot::Mutex;
use proptest::prelude::*;

/// Proxy that records its label into a shared release log
struct Labelled {
    label: usize,
    log: Arc<Mutex<Vec<usize>>>,
}

impl RemoteHandle for Labelled {
    fn describe(&self) -> String {
        format!("shape {}", self.label)
    }

    fn release(&self) -> Result<(), RemoteError> {
        self.log.lock().push(self.label);
        Ok(())
    }

    fn add_ref(&self) -> Result<u32, RemoteError> {
        Ok(1)
    }

    fn release_ref(&self) -> Result<u32, RemoteError> {
        Ok(0)
    }
}

fn track_n(session: &Session, n: usize, log: &Arc<Mutex<Vec<usize>>>) {
    for label in 0..n {
        session.track(Arc::new(Labelled {
            label,
            log: Arc::clone(log),
        }));
    }
}

#[derive(Debug, Clone)]
enum Op {
    Track,
    Pause,
    Resume,
    ReleaseAll,
    ReleaseOldest(usize),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => Just(Op::Track),
        1 => Just(Op::Pause),
        1 => Just(Op::Resume),
        1 => Just(Op::ReleaseAll),
        1 => (0usize..6).prop_map(Op::ReleaseOldest),
    ]
}

proptest! {
    /// Every handle tracked once is released exactly once by an unpaused release_all.
    #[test]
    fn prop_release_all_releases_each_handle_once(n in 0usize..64) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let session = Session::new();
        track_n(&session, n, &log);

        let report = session.release_all();

        prop_assert_eq!(report.attempted, n);
        prop_assert_eq!(report.released, n);
        prop_assert_eq!(session.count(), 0);
        prop_assert_eq!(log.lock().clone(), (0..n).collect::<Vec<_>>());
    }

    /// With the gate held, no sequence of release calls releases anything.
    #[test]
    fn prop_paused_session_releases_nothing(
        n in 0usize..32,
        calls in prop::collection::vec(prop::option::of(0usize..40), 1..10),
    ) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let session = Session::new();
        session.pause();
        track_n(&session, n, &log);

        for call in calls {
            let report = match call {
                Some(k) => session.release_oldest(k),
                None => session.release_all(),
            };
            prop_assert!(report.deferred);
        }

        prop_assert!(log.lock().is_empty());
        prop_assert_eq!(session.count(), n);
    }

    /// release_oldest(n) releases exactly the first n tracked handles, in order.
    #[test]
    fn prop_release_oldest_is_fifo(k in 0usize..48, n in 0usize..64) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let session = Session::new();
        track_n(&session, k, &log);
        let ids = session.tracked_ids();

        let report = session.release_oldest(n);
        let released = n.min(k);

        prop_assert_eq!(report.released, released);
        prop_assert_eq!(log.lock().clone(), (0..released).collect::<Vec<_>>());
        prop_assert_eq!(session.tracked_ids(), ids[released..].to_vec());
    }

    /// Across arbitrary interleavings, releases happen only with the gate open,
    /// and every handle is released at most once.
    #[test]
    fn prop_gate_precedence_holds_for_any_sequence(ops in prop::collection::vec(arb_op(), 1..60)) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let session = Session::new();
        let mut next_label = 0usize;
        let mut depth = 0usize;

        for op in ops {
            let before = log.lock().len();
            match op {
                Op::Track => {
                    session.track(Arc::new(Labelled { label: next_label, log: Arc::clone(&log) }));
                    next_label += 1;
                }
                Op::Pause => {
                    session.pause();
                    depth += 1;
                }
                Op::Resume => {
                    session.resume();
                    depth = depth.saturating_sub(1);
                }
                Op::ReleaseAll => {
                    session.release_all();
                }
                Op::ReleaseOldest(n) => {
                    session.release_oldest(n);
                }
            }
            if depth > 0 {
                prop_assert_eq!(log.lock().len(), before);
            }
            prop_assert_eq!(session.pause_depth(), depth);
        }

        let mut released = log.lock().clone();
        let total = released.len();
        released.sort_unstable();
        released.dedup();
        prop_assert_eq!(released.len(), total);
    }
}

#[test]
fn test_release_oldest_two_of_five_keeps_newest_three() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let session = Session::new();
    track_n(&session, 5, &log);
    let ids = session.tracked_ids();

    session.release_oldest(2);

    assert_eq!(session.count(), 3);
    assert_eq!(session.tracked_ids(), ids[2..].to_vec());
    assert_eq!(*log.lock(), vec![0, 1]);
}

#[test]
fn test_pause_track_release_resume_release() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let session = Session::new();

    session.pause();
    track_n(&session, 3, &log);
    let first = session.release_all();
    session.resume();
    let second = session.release_all();

    assert!(first.deferred);
    assert_eq!(first.attempted, 0);
    assert_eq!(second.released, 3);
    assert_eq!(*log.lock(), vec![0, 1, 2]);
}

#[test]
fn test_nested_sections_keep_gate_closed_until_outermost_resume() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let session = Session::new();
    track_n(&session, 2, &log);

    let outer = session.hold();
    {
        let _inner = session.hold();
    }
    assert!(session.release_all().deferred);
    drop(outer);

    assert_eq!(session.release_all().released, 2);
}

#[test]
fn test_duplicate_tracking_releases_twice() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let session = Session::new();
    let shape = Arc::new(Labelled {
        label: 7,
        log: Arc::clone(&log),
    });

    session.track(shape.clone());
    session.track(shape);
    session.release_all();

    assert_eq!(*log.lock(), vec![7, 7]);
}

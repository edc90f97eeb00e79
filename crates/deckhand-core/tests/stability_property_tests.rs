//! Property-based tests for save confirmation
//!
//! **Property 6: Save confirmation idempotence**
//!
//! A file whose size has stopped changing is reported ready within a bounded
//! number of polls; a file that keeps growing is never reported ready.

use std::time::Duration;

use deckhand_core::{Readiness, StabilityProbe};
use proptest::prelude::*;

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .unwrap()
        .block_on(future)
}

proptest! {
    #[test]
    fn prop_settled_file_becomes_ready(
        growth in prop::collection::vec(1u64..4096, 0..10),
        stable_polls in 1u32..5,
        extra_budget in 0u32..5,
    ) {
        let mut sizes = Vec::new();
        let mut size = 0u64;
        for step in &growth {
            size += step;
            sizes.push(size);
        }
        let final_size = size + 1;
        let settle_at = growth.len() as u32 + stable_polls;

        let probe = StabilityProbe::new(Duration::from_secs(1), settle_at + extra_budget, stable_polls);
        let mut polls = 0usize;
        let readiness = block_on(probe.observe(|| {
            let observed = sizes.get(polls).copied().unwrap_or(final_size);
            polls += 1;
            Some(observed)
        }));

        prop_assert_eq!(readiness, Readiness::Ready { size: final_size, polls: settle_at });
    }

    #[test]
    fn prop_growing_file_never_ready(
        start in 1u64..1_000_000,
        step in 1u64..4096,
        max_polls in 1u32..40,
        stable_polls in 1u32..5,
    ) {
        let probe = StabilityProbe::new(Duration::from_millis(500), max_polls, stable_polls);
        let mut size = start;
        let readiness = block_on(probe.observe(|| {
            size += step;
            Some(size)
        }));

        prop_assert!(!readiness.is_ready());
        prop_assert_eq!(readiness.polls(), max_polls);
    }
}

#[tokio::test(start_paused = true)]
async fn test_real_file_confirms_after_stable_polls() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("deck.pptx");
    std::fs::write(&path, vec![0u8; 2048]).unwrap();

    let readiness = StabilityProbe::default().wait_until_stable(&path).await;
    assert_eq!(readiness, Readiness::Ready { size: 2048, polls: 3 });
}

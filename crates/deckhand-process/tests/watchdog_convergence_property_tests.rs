//! Property-based tests for watchdog convergence
//!
//! **Property: Watchdog Convergence**
//!
//! After `ensure_terminated(name)` returns, either no process named `name`
//! remains, or termination was attempted and reported as failed for every
//! remaining match. No match is skipped silently.

use std::collections::HashMap;
use std::time::Duration;

use deckhand_process::{
    ProcessEntry, ProcessError, ProcessTable, ProcessWatchdog, TerminationOutcome, WatchdogConfig,
};
use parking_lot::Mutex;
use proptest::prelude::*;

#[derive(Debug, Clone, Copy)]
struct Behavior {
    close_fails: bool,
    exits_on_close: bool,
    killable: bool,
}

fn arb_behavior() -> impl Strategy<Value = Behavior> {
    (any::<bool>(), any::<bool>(), any::<bool>()).prop_map(|(close_fails, exits_on_close, killable)| {
        Behavior {
            close_fails,
            exits_on_close,
            killable,
        }
    })
}

struct ScriptedTable {
    procs: Mutex<HashMap<u32, (String, Behavior)>>,
}

impl ProcessTable for ScriptedTable {
    fn find(&self, name: &str) -> Vec<ProcessEntry> {
        self.procs
            .lock()
            .iter()
            .filter(|(_, (n, _))| n == name)
            .map(|(pid, (n, _))| ProcessEntry {
                pid: *pid,
                name: n.clone(),
            })
            .collect()
    }

    fn request_close(&self, pid: u32) -> deckhand_process::Result<()> {
        let mut procs = self.procs.lock();
        let behavior = procs.get(&pid).map(|(_, b)| *b).ok_or(ProcessError::NotFound { pid })?;
        if behavior.close_fails {
            return Err(ProcessError::CloseFailed {
                pid,
                reason: "denied".to_string(),
            });
        }
        if behavior.exits_on_close {
            procs.remove(&pid);
        }
        Ok(())
    }

    fn force_kill(&self, pid: u32) -> deckhand_process::Result<()> {
        let mut procs = self.procs.lock();
        let behavior = procs.get(&pid).map(|(_, b)| *b).ok_or(ProcessError::NotFound { pid })?;
        if behavior.killable {
            procs.remove(&pid);
            Ok(())
        } else {
            Err(ProcessError::KillFailed {
                pid,
                reason: "denied".to_string(),
            })
        }
    }

    fn is_alive(&self, pid: u32) -> bool {
        self.procs.lock().contains_key(&pid)
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_every_match_gets_an_outcome(
        hosts in prop::collection::vec(arb_behavior(), 0..8),
        bystanders in 0usize..3,
    ) {
        let mut procs = HashMap::new();
        for (i, behavior) in hosts.iter().enumerate() {
            procs.insert(100 + i as u32, ("host".to_string(), *behavior));
        }
        for i in 0..bystanders {
            procs.insert(900 + i as u32, (
                "editor".to_string(),
                Behavior { close_fails: false, exits_on_close: true, killable: true },
            ));
        }

        let watchdog = ProcessWatchdog::with_table(
            ScriptedTable { procs: Mutex::new(procs) },
            WatchdogConfig::default().grace_period(Duration::from_millis(500)),
        );

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()
            .unwrap();
        let report = runtime.block_on(watchdog.ensure_terminated("host"));

        prop_assert_eq!(report.matched(), hosts.len());

        for (entry, outcome) in &report.outcomes {
            let behavior = hosts[(entry.pid - 100) as usize];
            let survives = !(behavior.exits_on_close && !behavior.close_fails) && !behavior.killable;
            match outcome {
                TerminationOutcome::Failed { .. } => prop_assert!(survives),
                TerminationOutcome::ExitedGracefully | TerminationOutcome::Killed => {
                    prop_assert!(!survives)
                }
            }
        }

        let mut remaining: Vec<u32> = watchdog.table().find("host").iter().map(|e| e.pid).collect();
        let mut failed: Vec<u32> = report.failures().map(|(e, _)| e.pid).collect();
        remaining.sort_unstable();
        failed.sort_unstable();
        prop_assert_eq!(remaining, failed);
        prop_assert_eq!(watchdog.table().find("editor").len(), bystanders);
    }
}

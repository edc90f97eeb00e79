//! Timeout-bounded supervision of a generation run
//!
//! The workload runs as its own tokio task. Whatever happens to it, the run
//! ends with a session teardown and a watchdog pass over the host process
//! name, so the host never outlives the run.

use std::any::Any;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use deckhand_process::{TerminationReport, Terminator};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::{debug, error, info, warn};

use crate::error::SupervisionError;
use crate::eviction::AgingBatchReleaser;
use crate::registry::ReleaseReport;
use crate::session::Session;

/// Supervisor settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorConfig {
    /// Wall-clock bound on the workload
    pub timeout: Duration,
    /// Time a timed-out worker gets to notice cancellation before it is aborted
    pub cancel_grace: Duration,
    /// Host process name handed to the watchdog
    pub host_process_name: String,
    /// Trimming policy handed to the workload
    pub releaser: AgingBatchReleaser,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(300),
            cancel_grace: Duration::from_secs(2),
            host_process_name: "POWERPNT".to_string(),
            releaser: AgingBatchReleaser::default(),
        }
    }
}

/// What the workload gets to work with
#[derive(Debug, Clone)]
pub struct WorkContext {
    session: Arc<Session>,
    cancel: CancellationToken,
    releaser: AgingBatchReleaser,
}

impl WorkContext {
    /// Session that tracks this run's handles
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Shared handle to the session
    pub fn session_arc(&self) -> Arc<Session> {
        Arc::clone(&self.session)
    }

    /// Fail with [`SupervisionError::Cancelled`] once the run was cancelled.
    ///
    /// Call at safe points between remote calls.
    pub fn checkpoint(&self) -> Result<(), SupervisionError> {
        if self.cancel.is_cancelled() {
            debug!(session = %self.session.id(), "Worker observed cancellation");
            Err(SupervisionError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Whether the run was cancelled
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves when the run is cancelled, for use in `select!`
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.cancel.cancelled()
    }

    /// Trim aged handles at a section boundary
    pub fn end_of_section(&self) -> Option<ReleaseReport> {
        self.releaser.trim(&self.session)
    }
}

/// How a supervised run ended
#[derive(Debug)]
pub enum SupervisionOutcome<T> {
    /// The workload finished and produced a value
    Completed(T),
    /// The workload did not finish in time
    TimedOut,
    /// The workload failed or panicked
    Failed(SupervisionError),
}

/// Final report of a supervised run
#[derive(Debug)]
pub struct SupervisionReport<T> {
    /// Exactly one of completed, timed out, failed
    pub outcome: SupervisionOutcome<T>,
    /// Time from start until cleanup finished
    pub elapsed: Duration,
    /// Watchdog passes in the order they ran
    pub watchdog: Vec<TerminationReport>,
    /// Release pass performed during cleanup
    pub cleanup: ReleaseReport,
}

impl<T> SupervisionReport<T> {
    /// Whether the workload completed
    pub fn completed(&self) -> bool {
        matches!(self.outcome, SupervisionOutcome::Completed(_))
    }

    /// Whether the run hit its timeout
    pub fn timed_out(&self) -> bool {
        matches!(self.outcome, SupervisionOutcome::TimedOut)
    }

    /// The failure, if the workload failed
    pub fn error(&self) -> Option<&SupervisionError> {
        match self.outcome {
            SupervisionOutcome::Failed(ref e) => Some(e),
            _ => None,
        }
    }

    /// The value, if the workload completed
    pub fn into_value(self) -> Option<T> {
        match self.outcome {
            SupervisionOutcome::Completed(value) => Some(value),
            _ => None,
        }
    }
}

/// Runs workloads under a timeout and guarantees host cleanup
pub struct Supervisor {
    config: SupervisorConfig,
    terminator: Arc<dyn Terminator>,
}

impl Supervisor {
    /// Create a supervisor
    pub fn new(config: SupervisorConfig, terminator: Arc<dyn Terminator>) -> Self {
        Self { config, terminator }
    }

    /// Get the supervisor settings
    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    /// Run `work` against `session` with the configured timeout.
    ///
    /// On timeout the host is terminated first, then the worker is cancelled
    /// and, if it does not stop within the grace period, aborted. Cleanup
    /// (session teardown followed by a second watchdog pass) runs exactly once
    /// on every path.
    pub async fn run<T, F, Fut>(&self, session: Arc<Session>, work: F) -> SupervisionReport<T>
    where
        F: FnOnce(WorkContext) -> Fut,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let started = Instant::now();
        let cancel = CancellationToken::new();
        let context = WorkContext {
            session: Arc::clone(&session),
            cancel: cancel.clone(),
            releaser: self.config.releaser,
        };

        info!(
            session = %session.id(),
            timeout_secs = self.config.timeout.as_secs(),
            host = %self.config.host_process_name,
            "Starting supervised run"
        );

        let mut handle = tokio::spawn(work(context));
        let mut watchdog = Vec::with_capacity(2);

        let waited = tokio::time::timeout(self.config.timeout, &mut handle).await;
        let outcome = match waited {
            Ok(joined) => classify(joined),
            Err(_) => {
                warn!(
                    session = %session.id(),
                    timeout_secs = self.config.timeout.as_secs(),
                    "Supervised run timed out"
                );
                watchdog.push(
                    self.terminator
                        .ensure_terminated(&self.config.host_process_name)
                        .await,
                );
                cancel.cancel();
                self.stop_worker(handle).await;
                SupervisionOutcome::TimedOut
            }
        };

        let cleanup = session.teardown();
        watchdog.push(
            self.terminator
                .ensure_terminated(&self.config.host_process_name)
                .await,
        );

        let elapsed = started.elapsed();
        match outcome {
            SupervisionOutcome::Completed(_) => {
                info!(session = %session.id(), elapsed_ms = elapsed.as_millis() as u64, "Supervised run completed")
            }
            SupervisionOutcome::TimedOut => {
                warn!(session = %session.id(), elapsed_ms = elapsed.as_millis() as u64, "Supervised run abandoned after timeout")
            }
            SupervisionOutcome::Failed(ref e) => {
                error!(session = %session.id(), error = %e, "Supervised run failed")
            }
        }

        SupervisionReport {
            outcome,
            elapsed,
            watchdog,
            cleanup,
        }
    }

    async fn stop_worker<T>(&self, mut handle: JoinHandle<T>) {
        if tokio::time::timeout(self.config.cancel_grace, &mut handle)
            .await
            .is_ok()
        {
            debug!("Worker stopped after cancellation");
            return;
        }

        warn!("Worker ignored cancellation, aborting");
        handle.abort();
        // A worker stuck in a blocking call cannot be reaped; do not wait on it forever.
        if tokio::time::timeout(self.config.cancel_grace, handle)
            .await
            .is_err()
        {
            warn!("Aborted worker has not yielded yet");
        }
    }
}

fn classify<T>(joined: Result<anyhow::Result<T>, JoinError>) -> SupervisionOutcome<T> {
    match joined {
        Ok(Ok(value)) => SupervisionOutcome::Completed(value),
        Ok(Err(e)) => match e.downcast::<SupervisionError>() {
            Ok(inner) => SupervisionOutcome::Failed(inner),
            Err(e) => SupervisionOutcome::Failed(SupervisionError::Work(e)),
        },
        Err(join) if join.is_panic() => {
            SupervisionOutcome::Failed(SupervisionError::Panicked(panic_message(join.into_panic())))
        }
        Err(_) => SupervisionOutcome::Failed(SupervisionError::Cancelled),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct CountingTerminator {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Terminator for CountingTerminator {
        async fn ensure_terminated(&self, process_name: &str) -> TerminationReport {
            self.calls.lock().push(process_name.to_string());
            TerminationReport {
                process_name: process_name.to_string(),
                outcomes: Vec::new(),
            }
        }
    }

    fn supervisor(timeout: Duration) -> (Supervisor, Arc<CountingTerminator>) {
        let terminator = Arc::new(CountingTerminator::default());
        let config = SupervisorConfig {
            timeout,
            cancel_grace: Duration::from_secs(1),
            host_process_name: "host".to_string(),
            releaser: AgingBatchReleaser::default(),
        };
        (Supervisor::new(config, terminator.clone()), terminator)
    }

    #[tokio::test(start_paused = true)]
    async fn test_completed_run_still_runs_watchdog() {
        let (supervisor, terminator) = supervisor(Duration::from_secs(5));
        let report = supervisor
            .run(Arc::new(Session::new()), |_ctx| async { Ok::<_, anyhow::Error>("done") })
            .await;

        assert!(report.completed());
        assert!(!report.timed_out());
        assert!(report.error().is_none());
        assert_eq!(terminator.calls.lock().len(), 1);
        assert_eq!(report.into_value(), Some("done"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_work_error_is_reported() {
        let (supervisor, _) = supervisor(Duration::from_secs(5));
        let report = supervisor
            .run(Arc::new(Session::new()), |_ctx| async {
                Err::<(), _>(anyhow::anyhow!("shape insert failed"))
            })
            .await;

        assert!(matches!(report.error(), Some(SupervisionError::Work(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_panic_is_reported() {
        let (supervisor, _) = supervisor(Duration::from_secs(5));
        let report = supervisor
            .run(Arc::new(Session::new()), |_ctx| async {
                if true {
                    panic!("host went away");
                }
                Ok::<(), anyhow::Error>(())
            })
            .await;

        match report.error() {
            Some(SupervisionError::Panicked(msg)) => assert!(msg.contains("host went away")),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooperative_worker_stops_on_timeout() {
        let (supervisor, terminator) = supervisor(Duration::from_secs(10));
        let stopped = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag = stopped.clone();

        let report = supervisor
            .run(Arc::new(Session::new()), move |ctx| async move {
                tokio::select! {
                    _ = ctx.cancelled() => {
                        flag.store(true, std::sync::atomic::Ordering::SeqCst);
                        Err(anyhow::Error::from(SupervisionError::Cancelled))
                    }
                    _ = tokio::time::sleep(Duration::from_secs(600)) => Ok::<(), anyhow::Error>(()),
                }
            })
            .await;

        assert!(report.timed_out());
        assert!(stopped.load(std::sync::atomic::Ordering::SeqCst));
        assert_eq!(terminator.calls.lock().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_checkpoint_cancellation_maps_to_cancelled() {
        let (supervisor, _) = supervisor(Duration::from_secs(5));
        let report = supervisor
            .run(Arc::new(Session::new()), |ctx| async move {
                ctx.cancel.cancel();
                ctx.checkpoint()?;
                Ok::<(), anyhow::Error>(())
            })
            .await;

        assert!(matches!(report.error(), Some(SupervisionError::Cancelled)));
    }
}

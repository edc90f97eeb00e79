//! File-size stability confirmation
//!
//! Native save calls can return before the host has flushed the file. A file
//! counts as ready once its size is unchanged across several consecutive
//! polls; a file that keeps growing never does.

use std::path::Path;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, warn};

/// Result of waiting for a file to settle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// Size held steady for the required number of polls
    Ready { size: u64, polls: u32 },
    /// Poll budget ran out first; the caller must verify the file itself
    Unsettled { last_size: Option<u64>, polls: u32 },
}

impl Readiness {
    /// Whether the file was confirmed stable
    pub fn is_ready(&self) -> bool {
        matches!(self, Readiness::Ready { .. })
    }

    /// Number of polls taken
    pub fn polls(&self) -> u32 {
        match self {
            Readiness::Ready { polls, .. } | Readiness::Unsettled { polls, .. } => *polls,
        }
    }
}

/// Polls a file size until it stops changing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StabilityProbe {
    /// Delay between polls
    pub poll_interval: Duration,
    /// Upper bound on polls after the baseline observation
    pub max_polls: u32,
    /// Consecutive polls that must see the size unchanged (at least 1)
    pub stable_polls: u32,
}

impl StabilityProbe {
    /// Create a probe
    pub fn new(poll_interval: Duration, max_polls: u32, stable_polls: u32) -> Self {
        Self {
            poll_interval,
            max_polls,
            stable_polls: stable_polls.max(1),
        }
    }

    /// Poll `path` until its size is stable or the budget is spent.
    ///
    /// Missing and empty files never count toward stability.
    pub async fn wait_until_stable(&self, path: &Path) -> Readiness {
        let readiness = self
            .observe(|| {
                std::fs::metadata(path)
                    .ok()
                    .filter(|meta| meta.is_file())
                    .map(|meta| meta.len())
            })
            .await;

        match readiness {
            Readiness::Ready { size, polls } => {
                debug!(path = %path.display(), size, polls, "Output file is stable");
            }
            Readiness::Unsettled { last_size, polls } => {
                warn!(
                    path = %path.display(),
                    last_size = ?last_size,
                    polls,
                    "Output file did not settle; caller must verify it"
                );
            }
        }
        readiness
    }

    /// Core polling loop over an arbitrary size source.
    ///
    /// The first observation is a baseline taken without waiting; each poll
    /// after it is compared to the previous one, and only unchanged
    /// comparisons count toward `stable_polls`.
    pub async fn observe<F>(&self, mut size_of: F) -> Readiness
    where
        F: FnMut() -> Option<u64>,
    {
        let mut last: Option<u64> = size_of().filter(|size| *size > 0);
        let mut streak = 0u32;

        for poll in 1..=self.max_polls {
            sleep(self.poll_interval).await;

            match size_of().filter(|size| *size > 0) {
                Some(size) if last == Some(size) => streak += 1,
                observed => {
                    last = observed;
                    streak = 0;
                }
            }

            if streak >= self.stable_polls {
                if let Some(size) = last {
                    return Readiness::Ready { size, polls: poll };
                }
            }
        }

        Readiness::Unsettled {
            last_size: last,
            polls: self.max_polls,
        }
    }
}

impl Default for StabilityProbe {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), 30, 3)
    }
}

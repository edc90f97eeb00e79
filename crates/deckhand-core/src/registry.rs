//! Ordered registry of tracked remote handles

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::remote::RemoteHandle;

/// Tracking sequence number of a handle within its session
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HandleId(pub u64);

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One tracked handle
#[derive(Clone)]
pub struct HandleRecord {
    /// Sequence number assigned at tracking time
    pub id: HandleId,
    /// The proxy itself
    pub handle: Arc<dyn RemoteHandle>,
}

impl fmt::Debug for HandleRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandleRecord")
            .field("id", &self.id)
            .field("handle", &self.handle.describe())
            .finish()
    }
}

/// Outcome of a release pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReleaseReport {
    /// Records a release was attempted on
    pub attempted: usize,
    /// Releases that succeeded
    pub released: usize,
    /// Releases that returned an error
    pub failed: usize,
    /// Nothing was released because batch release is paused
    pub deferred: bool,
}

impl ReleaseReport {
    /// Report for a pass skipped by the pause gate
    pub fn deferred() -> Self {
        Self {
            deferred: true,
            ..Self::default()
        }
    }
}

/// Append-ordered handle registry.
///
/// Insertion order is release order. The same proxy tracked twice yields two
/// records and will be released twice.
#[derive(Debug, Default)]
pub struct HandleRegistry {
    records: VecDeque<HandleRecord>,
    next_seq: u64,
}

impl HandleRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handle, returning its sequence number
    pub fn track(&mut self, handle: Arc<dyn RemoteHandle>) -> HandleId {
        let id = HandleId(self.next_seq);
        self.next_seq += 1;
        self.records.push_back(HandleRecord { id, handle });
        id
    }

    /// Number of tracked records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether nothing is tracked
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Sequence numbers in tracking order
    pub fn ids(&self) -> Vec<HandleId> {
        self.records.iter().map(|record| record.id).collect()
    }

    /// Remove every record, oldest first
    pub fn drain_all(&mut self) -> Vec<HandleRecord> {
        self.records.drain(..).collect()
    }

    /// Remove up to `n` of the oldest records
    pub fn drain_oldest(&mut self, n: usize) -> Vec<HandleRecord> {
        let n = n.min(self.records.len());
        self.records.drain(..n).collect()
    }
}

/// Release each record in order. One failure never stops the rest.
pub(crate) fn release_records(records: Vec<HandleRecord>) -> ReleaseReport {
    let mut report = ReleaseReport {
        attempted: records.len(),
        ..ReleaseReport::default()
    };

    for record in records {
        match record.handle.release() {
            Ok(()) => {
                report.released += 1;
                debug!(handle = %record.id, what = %record.handle.describe(), "Released handle");
            }
            Err(e) => {
                report.failed += 1;
                warn!(
                    handle = %record.id,
                    what = %record.handle.describe(),
                    error = %e,
                    "Failed to release handle"
                );
            }
        }
    }

    report
}

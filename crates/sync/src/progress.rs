//! Progress observation.
//!
//! Observers are called synchronously from the sync task, once before and
//! once after each account, plus a final `Complete` snapshot. Keep them
//! cheap; anything slow should hand the snapshot off to another task.

use adledger_core::SyncProgress;
use parking_lot::Mutex;

/// Receives progress snapshots during a sync.
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, progress: &SyncProgress);
}

impl<F> ProgressObserver for F
where
    F: Fn(&SyncProgress) + Send + Sync,
{
    fn on_progress(&self, progress: &SyncProgress) {
        self(progress);
    }
}

/// Observer that records every snapshot it receives.
#[derive(Debug, Default)]
pub struct ProgressLog {
    snapshots: Mutex<Vec<SyncProgress>>,
}

impl ProgressLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies of every snapshot received so far, in order.
    #[must_use]
    pub fn snapshots(&self) -> Vec<SyncProgress> {
        self.snapshots.lock().clone()
    }

    /// The most recent snapshot.
    #[must_use]
    pub fn last(&self) -> Option<SyncProgress> {
        self.snapshots.lock().last().cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshots.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshots.lock().is_empty()
    }
}

impl ProgressObserver for ProgressLog {
    fn on_progress(&self, progress: &SyncProgress) {
        self.snapshots.lock().push(progress.clone());
    }
}

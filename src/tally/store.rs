use crate::tally::models::{Color, Tally};
use std::ops::Deref;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

/// The single authoritative tally for this process.
///
/// Counters are only reachable through [`TallyStore::apply_vote`] and
/// [`TallyStore::reset`]; both serialize on one lock so concurrent votes are
/// never lost.
#[derive(Clone, Default)]
pub struct TallyStore {
    tally: Arc<Mutex<Tally>>,
}

/// Read-only view of the locked tally.
///
/// The store stays locked until the guard is dropped, so anything published
/// while holding it reaches observers in the same order the mutations happened.
pub struct TallyGuard<'a> {
    guard: MutexGuard<'a, Tally>,
}

impl TallyGuard<'_> {
    pub fn snapshot(&self) -> Tally {
        *self.guard
    }
}

impl Deref for TallyGuard<'_> {
    type Target = Tally;

    fn deref(&self) -> &Tally {
        &self.guard
    }
}

impl TallyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn apply_vote(&self, color: Color) -> TallyGuard<'_> {
        let mut guard = self.tally.lock().await;
        guard.increment(color);
        TallyGuard { guard }
    }

    pub async fn reset(&self) -> TallyGuard<'_> {
        let mut guard = self.tally.lock().await;
        *guard = Tally::default();
        TallyGuard { guard }
    }

    /// Locks without mutating, e.g. to subscribe at a consistent point.
    pub async fn read(&self) -> TallyGuard<'_> {
        TallyGuard {
            guard: self.tally.lock().await,
        }
    }

    pub async fn snapshot(&self) -> Tally {
        *self.tally.lock().await
    }
}

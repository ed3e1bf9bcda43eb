//! Per-session mutual exclusion for load-modify-save spans.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::session::SessionId;

/// Table of one mutex per session id with an operation in flight.
///
/// Slots are created on demand and dropped once nobody holds or waits on
/// them, so the table only ever contains ids that are currently busy.
#[derive(Debug, Default)]
pub struct SessionLocks {
    slots: Mutex<HashMap<SessionId, Arc<Mutex<()>>>>,
}

impl SessionLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` while holding the lock for `id`.
    ///
    /// The slot is released even when `f` unwinds.
    pub fn hold<R>(&self, id: &SessionId, f: impl FnOnce() -> R) -> R {
        // Dropped in reverse order: guard, then slot, then the table entry.
        let _release = Release { locks: self, id: *id };
        let slot = self.slot(id);
        let _guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
        f()
    }

    /// Number of ids with an operation in flight.
    #[must_use]
    pub fn busy(&self) -> usize {
        self.table().len()
    }

    fn table(&self) -> std::sync::MutexGuard<'_, HashMap<SessionId, Arc<Mutex<()>>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn slot(&self, id: &SessionId) -> Arc<Mutex<()>> {
        Arc::clone(self.table().entry(*id).or_default())
    }

    fn release(&self, id: &SessionId) {
        let mut table = self.table();
        if let Some(slot) = table.get(id)
            && Arc::strong_count(slot) == 1
        {
            table.remove(id);
        }
    }
}

struct Release<'a> {
    locks: &'a SessionLocks,
    id: SessionId,
}

impl Drop for Release<'_> {
    fn drop(&mut self) {
        self.locks.release(&self.id);
    }
}

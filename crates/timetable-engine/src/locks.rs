//! Per-venue locks serialising check-then-write spans.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{StoreError, StoreResult};
use crate::model::VenueId;

type VenueLock = Arc<Mutex<()>>;

/// Lazily created mutex per venue.
#[derive(Debug, Default)]
pub struct VenueLocks {
    table: Mutex<HashMap<VenueId, VenueLock>>,
}

impl VenueLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handles for `venues`, deduplicated and in ascending id order so that
    /// callers locking several venues always acquire them in the same order.
    pub fn handles(&self, venues: &[VenueId]) -> StoreResult<Vec<VenueLock>> {
        let mut ids = venues.to_vec();
        ids.sort_unstable();
        ids.dedup();

        let mut table = self
            .table
            .lock()
            .map_err(|_| StoreError::LockPoisoned("venue lock table"))?;
        Ok(ids
            .into_iter()
            .map(|id| Arc::clone(table.entry(id).or_default()))
            .collect())
    }
}

/// Acquire every handle in order.
pub fn lock_all(handles: &[VenueLock]) -> StoreResult<Vec<MutexGuard<'_, ()>>> {
    handles
        .iter()
        .map(|h| h.lock().map_err(|_| StoreError::LockPoisoned("venue lock")))
        .collect()
}

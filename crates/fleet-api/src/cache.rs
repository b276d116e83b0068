//! In-memory cache of recorded location histories, keyed by vehicle id.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use live_track::Location;

#[derive(Debug)]
struct Entry {
    records: Vec<Location>,
    fetched_at: Instant,
}

/// Shared history cache. Clones share entries.
///
/// An entry older than `stale_after` is never served. A zero `stale_after`
/// disables caching altogether.
#[derive(Debug, Clone)]
pub struct HistoryCache {
    entries: Arc<DashMap<String, Entry>>,
    stale_after: Duration,
}

impl Default for HistoryCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl HistoryCache {
    #[must_use]
    pub fn new(stale_after: Duration) -> Self {
        Self { entries: Arc::new(DashMap::new()), stale_after }
    }

    /// Cached history for `vehicle_id`, if still fresh.
    #[must_use]
    pub fn get(&self, vehicle_id: &str) -> Option<Vec<Location>> {
        let cached = self.entries.get(vehicle_id).map(|entry| {
            (entry.fetched_at.elapsed() < self.stale_after).then(|| entry.records.clone())
        })?;

        if cached.is_none() {
            self.entries
                .remove_if(vehicle_id, |_, entry| entry.fetched_at.elapsed() >= self.stale_after);
        }
        cached
    }

    pub fn insert(&self, vehicle_id: &str, records: Vec<Location>) {
        if self.stale_after.is_zero() {
            return;
        }
        self.entries.insert(vehicle_id.to_string(), Entry { records, fetched_at: Instant::now() });
    }

    /// Drop the entry for `vehicle_id`. Returns whether one was held.
    pub fn invalidate(&self, vehicle_id: &str) -> bool {
        self.entries.remove(vehicle_id).is_some()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

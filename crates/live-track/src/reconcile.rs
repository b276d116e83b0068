//! # Track Reconciler
//!
//! Merges incoming location records into an ordered, duplicate-free track.

use std::collections::HashMap;

use serde::Serialize;

use crate::model::{Location, Update};

/// Merge `incoming` into `current`.
///
/// Records are keyed by `id`; a record replaces any earlier one with the same
/// `id` while keeping that record's original slot. The result is then stably
/// sorted by timestamp, so ties keep their merge order.
#[must_use]
pub fn reconcile(current: &[Location], incoming: Update) -> Vec<Location> {
    let mut slots: HashMap<String, usize> = HashMap::with_capacity(current.len() + incoming.len());
    let mut merged: Vec<Location> = Vec::with_capacity(current.len() + incoming.len());

    for record in current.iter().cloned().chain(incoming.into_records()) {
        if let Some(&slot) = slots.get(&record.id) {
            merged[slot] = record;
        } else {
            slots.insert(record.id.clone(), merged.len());
            merged.push(record);
        }
    }

    merged.sort_by_key(|record| record.timestamp);
    merged
}

/// Ordered location history for one vehicle.
///
/// No two records share an `id` and timestamps never decrease. The only way
/// to grow a track is [`Track::reconcile`], which returns a new track.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Track(Vec<Location>);

impl Track {
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// A new track with `incoming` merged in.
    #[must_use]
    pub fn reconcile(&self, incoming: impl Into<Update>) -> Self {
        Self(reconcile(&self.0, incoming.into()))
    }

    #[must_use]
    pub fn records(&self) -> &[Location] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Location> {
        self.0.iter()
    }

    /// Most recent record by timestamp.
    #[must_use]
    pub fn last(&self) -> Option<&Location> {
        self.0.last()
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Location> {
        self.0.iter().find(|record| record.id == id)
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

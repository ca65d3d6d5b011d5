//! Novelty detection against every event seen since startup.
//!
//! The first batch is a baseline: it seeds the seen-set and reports nothing,
//! so a restart never back-fills alerts for historical events.

use std::collections::HashSet;

use crate::model::{EarthquakeRecord, EventKey};

/// Owns the process-lifetime set of observed [`EventKey`]s.
///
/// Keys are only ever inserted; a key reported as new once is never
/// reported again.
#[derive(Debug, Default)]
pub struct NoveltyTracker {
    seen: HashSet<EventKey>,
    baseline_established: bool,
}

impl NoveltyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classifies a full feed snapshot and returns the records whose keys
    /// were not seen before, in feed order.
    ///
    /// Duplicate keys inside one batch count once: the first occurrence is
    /// new, later ones are already seen.
    pub fn classify(&mut self, records: &[EarthquakeRecord]) -> Vec<EarthquakeRecord> {
        if !self.baseline_established {
            self.seen.extend(records.iter().map(EarthquakeRecord::event_key));
            self.baseline_established = true;
            return Vec::new();
        }

        records
            .iter()
            .filter(|record| self.seen.insert(record.event_key()))
            .cloned()
            .collect()
    }

    pub fn is_baseline_established(&self) -> bool {
        self.baseline_established
    }

    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }

    pub fn contains(&self, key: &EventKey) -> bool {
        self.seen.contains(key)
    }
}

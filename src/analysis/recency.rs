//! Event time parsing.
//!
//! Agencies disagree on the date separator (`2025-01-01` vs `2025.01.01`)
//! and on whether seconds are present, so every combination is tried.
//! Feed times are local to the reporting agency and are kept naive.

use chrono::NaiveDateTime;

use crate::model::EarthquakeRecord;

const DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y.%m.%d %H:%M:%S",
    "%Y.%m.%d %H:%M",
];

/// Parses a record's date and time fields. Returns `None` when neither
/// layout matches.
pub fn event_time(record: &EarthquakeRecord) -> Option<NaiveDateTime> {
    let joined = format!("{} {}", record.date.trim(), record.time.trim());
    DATE_TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(&joined, fmt).ok())
}

/// The latest parseable event time in a batch.
pub fn newest_event_time(records: &[EarthquakeRecord]) -> Option<NaiveDateTime> {
    records.iter().filter_map(event_time).max()
}

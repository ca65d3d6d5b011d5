//! Earthquake notification threshold checking.
//!
//! The rule table is evaluated in order and the first match wins:
//!   1. magnitude >= `min_magnitude`                        → notify anywhere
//!   2. within `max_distance_km` of the user and
//!      magnitude >= `notify_magnitude_threshold`           → notify nearby
//!   3. otherwise                                           → stay quiet
//!
//! The engine is pure: it never dispatches anything itself. Title/body
//! construction lives in `alert::notifier`.

use crate::alert::distance::haversine_km;
use crate::model::{EarthquakeRecord, GeoPoint, Thresholds};

/// Which rule matched for a notifying decision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AlertReason {
    /// Rule 1: strong enough to matter regardless of where the user is.
    Magnitude,
    /// Rule 2: close to the user and above the local threshold.
    Nearby { distance_km: f64 },
}

/// Outcome of evaluating one new record.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertDecision<'a> {
    pub record: &'a EarthquakeRecord,
    pub should_notify: bool,
    /// `Some` exactly when `should_notify` is true.
    pub reason: Option<AlertReason>,
}

/// Evaluates the rule table for a single record.
///
/// `user_location` is optional; without it only the global magnitude rule
/// can fire. Records with non-finite coordinates never satisfy the distance
/// rule.
pub fn evaluate(
    record: &EarthquakeRecord,
    user_location: Option<GeoPoint>,
    thresholds: &Thresholds,
) -> Option<AlertReason> {
    let magnitude = record.magnitude;

    if magnitude >= thresholds.min_magnitude {
        return Some(AlertReason::Magnitude);
    }

    let user = user_location.and_then(GeoPoint::valid)?;
    let epicenter = record.location()?;
    let distance_km = haversine_km(user, epicenter);

    if distance_km <= thresholds.max_distance_km
        && magnitude >= thresholds.notify_magnitude_threshold
    {
        Some(AlertReason::Nearby { distance_km })
    } else {
        None
    }
}

/// Returns `true` if the record should trigger a notification.
pub fn decide(
    record: &EarthquakeRecord,
    user_location: Option<GeoPoint>,
    thresholds: &Thresholds,
) -> bool {
    evaluate(record, user_location, thresholds).is_some()
}

/// Evaluates every record of a batch, preserving order.
pub fn decide_all<'a>(
    records: &'a [EarthquakeRecord],
    user_location: Option<GeoPoint>,
    thresholds: &Thresholds,
) -> Vec<AlertDecision<'a>> {
    records
        .iter()
        .map(|record| {
            let reason = evaluate(record, user_location, thresholds);
            AlertDecision {
                record,
                should_notify: reason.is_some(),
                reason,
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Local notification sink.
//!
//! The core only needs to hand over a title and a body; what "delivery"
//! means (desktop toast, phone banner, a log line) belongs to the
//! implementation.

use crate::alert::thresholds::AlertReason;
use crate::logging::{self, DataSource};
use crate::model::EarthquakeRecord;

/// Error returned by a notifier that could not schedule delivery.
#[derive(Debug, PartialEq)]
pub struct NotifyError(pub String);

impl std::fmt::Display for NotifyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Notification failed: {}", self.0)
    }
}

impl std::error::Error for NotifyError {}

/// Schedules immediate delivery of a user-facing notification.
pub trait Notifier: Send + Sync {
    fn notify(&self, title: &str, body: &str) -> Result<(), NotifyError>;
}

/// A notification ready to be dispatched.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertMessage {
    pub title: String,
    pub body: String,
}

/// Builds the title/body pair for an alerting record.
///
/// Magnitude and depth are shown exactly as the feed published them.
pub fn compose_message(record: &EarthquakeRecord, reason: AlertReason) -> AlertMessage {
    let mut body = format!("ML: {}, Depth: {} km", record.magnitude_raw, record.depth_raw);
    if let AlertReason::Nearby { distance_km } = reason {
        body.push_str(&format!(", {:.0} km away", distance_km));
    }

    AlertMessage {
        title: format!("New earthquake: {}", record.place),
        body,
    }
}

/// Writes notifications to the service log. Used by the daemon when no
/// platform notifier is wired in.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, title: &str, body: &str) -> Result<(), NotifyError> {
        logging::info(DataSource::Alert, None, &format!("🔔 {}: {}", title, body));
        Ok(())
    }
}

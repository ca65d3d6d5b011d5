//! Alerting: deciding which new events deserve a notification and handing
//! them to the notification collaborators.
//!
//! Submodules:
//! - `distance`: great-circle distance between a user and an epicenter.
//! - `location`: where the user is, when known.
//! - `thresholds`: the magnitude/distance rule table.
//! - `notifier`: local notification sink and message formatting.
//! - `push`: remote push relay (device registration, test broadcast).

pub mod distance;
pub mod location;
pub mod notifier;
pub mod push;
pub mod thresholds;

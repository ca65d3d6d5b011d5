//! User location collaborator.
//!
//! A provider answers `None` when the user has not granted (or configured)
//! a location; the alert rules then fall back to the magnitude-only rule.

use crate::model::GeoPoint;

pub trait LocationProvider: Send + Sync {
    fn current_location(&self) -> Option<GeoPoint>;
}

/// A location fixed at startup, typically from the `[location]` config
/// section.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedLocation(pub Option<GeoPoint>);

impl LocationProvider for FixedLocation {
    fn current_location(&self) -> Option<GeoPoint> {
        self.0.and_then(GeoPoint::valid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_location_filters_invalid_points() {
        assert_eq!(FixedLocation(None).current_location(), None);
        assert_eq!(
            FixedLocation(Some(GeoPoint::new(f64::NAN, 35.0))).current_location(),
            None
        );
        let ankara = GeoPoint::new(39.93, 32.86);
        assert_eq!(FixedLocation(Some(ankara)).current_location(), Some(ankara));
    }
}

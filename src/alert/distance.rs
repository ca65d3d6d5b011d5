//! Great-circle distance on a spherical Earth.

use crate::model::GeoPoint;

/// Mean Earth radius used by the haversine formula, in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine distance between two points given in degrees, in kilometres.
///
/// Symmetric and zero for identical points. Non-finite input yields NaN,
/// which compares false against any threshold.
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lon = (b.lon - a.lon).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_KM * c
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_to_self_is_zero() {
        let p = GeoPoint::new(39.0, 35.0);
        assert_eq!(haversine_km(p, p), 0.0);
    }

    #[test]
    fn test_quarter_meridian_length() {
        let d = haversine_km(GeoPoint::new(0.0, 0.0), GeoPoint::new(0.0, 90.0));
        assert!((d - 10007.5).abs() < 0.1, "expected ~10007.5 km, got {}", d);
    }

    #[test]
    fn test_distance_is_symmetric() {
        let istanbul = GeoPoint::new(41.0082, 28.9784);
        let ankara = GeoPoint::new(39.9334, 32.8597);
        let there = haversine_km(istanbul, ankara);
        let back = haversine_km(ankara, istanbul);
        assert!((there - back).abs() < 1e-9);
        // Road distance is ~450 km; great-circle is ~350 km.
        assert!(there > 340.0 && there < 360.0, "got {}", there);
    }

    #[test]
    fn test_non_finite_input_gives_nan() {
        let d = haversine_km(GeoPoint::new(f64::NAN, 35.0), GeoPoint::new(39.0, 35.0));
        assert!(d.is_nan());
    }
}

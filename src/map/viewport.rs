//! Viewport geometry and display-set preparation.

use crate::model::{EarthquakeRecord, GeoPoint};

/// Visible map extent in degrees. `west > east` means the box crosses the
/// antimeridian.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl BoundingBox {
    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        BoundingBox { west, south, east, north }
    }

    pub fn world() -> Self {
        BoundingBox::new(-180.0, -90.0, 180.0, 90.0)
    }

    /// Box centred on `center` spanning the given deltas, as reported by a
    /// map region.
    pub fn around(center: GeoPoint, latitude_delta: f64, longitude_delta: f64) -> Self {
        let half_lat = latitude_delta / 2.0;
        let half_lon = longitude_delta / 2.0;
        let wrap = |lon: f64| if lon > 180.0 { lon - 360.0 } else if lon < -180.0 { lon + 360.0 } else { lon };
        BoundingBox::new(
            wrap(center.lon - half_lon),
            (center.lat - half_lat).max(-90.0),
            wrap(center.lon + half_lon),
            (center.lat + half_lat).min(90.0),
        )
    }

    pub fn contains(&self, point: GeoPoint) -> bool {
        if !point.is_valid() || point.lat < self.south || point.lat > self.north {
            return false;
        }
        if self.west <= self.east {
            point.lon >= self.west && point.lon <= self.east
        } else {
            point.lon >= self.west || point.lon <= self.east
        }
    }

    pub fn longitude_span(&self) -> f64 {
        if self.west <= self.east {
            self.east - self.west
        } else {
            360.0 - self.west + self.east
        }
    }
}

/// Integer zoom for a visible longitude span: `round(log2(360 / delta))`.
///
/// Non-positive or non-finite spans are treated as the whole world.
pub fn zoom_for_longitude_delta(longitude_delta: f64) -> i32 {
    if !longitude_delta.is_finite() || longitude_delta <= 0.0 {
        return 0;
    }
    (360.0 / longitude_delta).log2().round() as i32
}

/// Zoom input for marker sizing: `10 / longitude_delta`, so the initial
/// 8° region gives 1.25. Kept apart from the integer zoom used for
/// clustering. Degenerate spans map to the fully-zoomed-in end.
pub fn marker_zoom_factor(longitude_delta: f64) -> f64 {
    if longitude_delta.is_nan() {
        return f64::NAN;
    }
    if longitude_delta <= 0.0 {
        return f64::INFINITY;
    }
    10.0 / longitude_delta
}

/// Draw order for a marker: stronger events on top.
pub fn z_index(magnitude: f64) -> i64 {
    let scaled = (magnitude * 100.0).floor();
    if scaled.is_finite() { (scaled as i64).max(1) } else { 1 }
}

/// The capped dataset split by magnitude.
#[derive(Debug, Default)]
pub struct DisplaySplit<'a> {
    /// Always drawn individually, weakest first so the strongest ends on top.
    pub high: Vec<(usize, &'a EarthquakeRecord)>,
    /// Candidates for clustering, in feed order.
    pub low: Vec<(usize, &'a EarthquakeRecord)>,
}

/// Applies the display limit, then splits at `high_magnitude_cutoff`
/// (inclusive on the high side). Indices refer to positions in `records`.
pub fn split_for_display(
    records: &[EarthquakeRecord],
    display_limit: usize,
    high_magnitude_cutoff: f64,
) -> DisplaySplit<'_> {
    let (mut high, low): (Vec<_>, Vec<_>) = records
        .iter()
        .enumerate()
        .take(display_limit)
        .partition(|(_, record)| record.magnitude >= high_magnitude_cutoff);

    high.sort_by(|(_, a), (_, b)| a.magnitude.total_cmp(&b.magnitude));
    DisplaySplit { high, low }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quake(ml: &str) -> EarthquakeRecord {
        EarthquakeRecord::from_fields("TEST", "2025-01-01", "10:00", "39.0", "35.0", ml, "10")
    }

    #[test]
    fn test_zoom_from_longitude_delta() {
        assert_eq!(zoom_for_longitude_delta(360.0), 0);
        assert_eq!(zoom_for_longitude_delta(8.0), 5); // log2(45) ≈ 5.49
        assert_eq!(zoom_for_longitude_delta(0.35), 10);
        assert_eq!(zoom_for_longitude_delta(0.0), 0);
        assert_eq!(zoom_for_longitude_delta(f64::NAN), 0);
    }

    #[test]
    fn test_marker_zoom_factor() {
        assert_eq!(marker_zoom_factor(8.0), 1.25);
        assert_eq!(marker_zoom_factor(0.5), 20.0);
        assert_eq!(marker_zoom_factor(0.0), f64::INFINITY);
        assert!(marker_zoom_factor(f64::NAN).is_nan());
    }

    #[test]
    fn test_bbox_contains_regular_and_antimeridian() {
        let turkey = BoundingBox::new(25.0, 35.0, 45.0, 43.0);
        assert!(turkey.contains(GeoPoint::new(39.0, 35.0)));
        assert!(!turkey.contains(GeoPoint::new(39.0, 50.0)));
        assert!(!turkey.contains(GeoPoint::new(f64::NAN, 35.0)));

        let pacific = BoundingBox::new(170.0, -50.0, -170.0, 0.0);
        assert!(pacific.contains(GeoPoint::new(-20.0, 175.0)));
        assert!(pacific.contains(GeoPoint::new(-20.0, -175.0)));
        assert!(!pacific.contains(GeoPoint::new(-20.0, 0.0)));
        assert_eq!(pacific.longitude_span(), 20.0);
    }

    #[test]
    fn test_bbox_around_initial_region() {
        let bbox = BoundingBox::around(GeoPoint::new(39.0, 35.0), 8.0, 8.0);
        assert_eq!(bbox, BoundingBox::new(31.0, 35.0, 39.0, 43.0));

        let wrapped = BoundingBox::around(GeoPoint::new(0.0, 178.0), 10.0, 10.0);
        assert_eq!(wrapped.west, 173.0);
        assert_eq!(wrapped.east, -177.0);
    }

    #[test]
    fn test_z_index() {
        assert_eq!(z_index(4.25), 425);
        assert_eq!(z_index(0.0), 1);
        assert_eq!(z_index(-2.0), 1);
        assert_eq!(z_index(f64::NAN), 1);
    }

    #[test]
    fn test_split_applies_limit_then_cutoff() {
        let records = vec![quake("4.5"), quake("1.0"), quake("6.1"), quake("4.0"), quake("2.2"), quake("7.0")];
        let split = split_for_display(&records, 5, 4.0);

        let high: Vec<usize> = split.high.iter().map(|(i, _)| *i).collect();
        let low: Vec<usize> = split.low.iter().map(|(i, _)| *i).collect();
        assert_eq!(high, vec![3, 0, 2], "ascending magnitude; index 5 is past the limit");
        assert_eq!(low, vec![1, 4]);
    }
}

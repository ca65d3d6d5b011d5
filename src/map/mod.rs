//! Map display preparation.
//!
//! Turns the current dataset plus a viewport into a list of encoded
//! markers and cluster bubbles for an external renderer. Nothing here has
//! side effects; a frame can be recomputed on every region change.
//!
//! Submodules:
//! - `viewport`: bounding boxes, zoom derivation, display-limit split.
//! - `cluster`: hierarchical greedy clustering of low-magnitude points.
//! - `visual`: marker size, severity color, bubble size.

pub mod cluster;
pub mod viewport;
pub mod visual;

use crate::model::{EarthquakeRecord, GeoPoint};
use cluster::{ClusterIndex, ClusterOptions};
use viewport::{marker_zoom_factor, split_for_display, z_index, zoom_for_longitude_delta, BoundingBox};

/// Viewport and display settings for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameRequest {
    pub bbox: BoundingBox,
    /// Map zoom level, drives clustering.
    pub zoom: f64,
    /// Input to marker sizing, see [`viewport::marker_zoom_factor`].
    pub marker_zoom: f64,
    pub display_limit: usize,
    /// Events at or above this magnitude are never clustered.
    pub high_magnitude_cutoff: f64,
    pub cluster: ClusterOptions,
}

impl FrameRequest {
    /// Request for a map region as reported by the renderer: a center plus
    /// the visible latitude and longitude spans in degrees.
    pub fn for_region(
        center: GeoPoint,
        latitude_delta: f64,
        longitude_delta: f64,
        display_limit: usize,
        high_magnitude_cutoff: f64,
        cluster: ClusterOptions,
    ) -> FrameRequest {
        FrameRequest {
            bbox: BoundingBox::around(center, latitude_delta, longitude_delta),
            zoom: f64::from(zoom_for_longitude_delta(longitude_delta)),
            marker_zoom: marker_zoom_factor(longitude_delta),
            display_limit,
            high_magnitude_cutoff,
            cluster,
        }
    }
}

/// A single event drawn as a circle.
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    /// Index into the dataset the frame was built from.
    pub record_index: usize,
    pub position: GeoPoint,
    pub size: f64,
    pub color: &'static str,
    pub z_index: i64,
}

/// An aggregated group of nearby low-magnitude events.
#[derive(Debug, Clone, PartialEq)]
pub struct Bubble {
    pub cluster_id: usize,
    pub position: GeoPoint,
    pub member_count: usize,
    pub size: f64,
    pub expansion_zoom: Option<u8>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapFrame {
    pub markers: Vec<Marker>,
    pub bubbles: Vec<Bubble>,
}

fn marker_for(index: usize, record: &EarthquakeRecord, position: GeoPoint, marker_zoom: f64) -> Marker {
    Marker {
        record_index: index,
        position,
        size: visual::marker_size(record.magnitude, marker_zoom),
        color: visual::color(record.magnitude),
        z_index: z_index(record.magnitude),
    }
}

/// Builds every drawable item for the viewport.
///
/// High-magnitude events inside the box are always individual markers.
/// Low-magnitude events are clustered; singleton clusters become markers,
/// larger ones become bubbles sized by their share of the visible
/// clustered points. Events without valid coordinates are skipped.
pub fn render_frame(records: &[EarthquakeRecord], request: &FrameRequest) -> MapFrame {
    let split = split_for_display(records, request.display_limit, request.high_magnitude_cutoff);
    let mut frame = MapFrame::default();

    // Low-magnitude points first so high-magnitude markers are appended last.
    let low_points: Vec<GeoPoint> = split
        .low
        .iter()
        .map(|(_, record)| GeoPoint::new(record.latitude, record.longitude))
        .collect();
    let index = ClusterIndex::build(&low_points, request.cluster);
    let visible = index.clusters(&request.bbox, request.zoom);
    let visible_points: usize = visible.iter().map(|c| c.member_count).sum();

    for entry in visible {
        match entry.point_index {
            Some(low_pos) => {
                let (record_index, record) = split.low[low_pos];
                frame.markers.push(marker_for(record_index, record, entry.centroid, request.marker_zoom));
            }
            None => frame.bubbles.push(Bubble {
                cluster_id: entry.id,
                position: entry.centroid,
                member_count: entry.member_count,
                size: visual::cluster_bubble_size(entry.member_count, visible_points),
                expansion_zoom: index.expansion_zoom(entry.id),
            }),
        }
    }

    for (record_index, record) in split.high {
        if let Some(position) = record.location().filter(|p| request.bbox.contains(*p)) {
            frame.markers.push(marker_for(record_index, record, position, request.marker_zoom));
        }
    }

    frame
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quake(lat: &str, lon: &str, ml: &str) -> EarthquakeRecord {
        EarthquakeRecord::from_fields("TEST", "2025-01-01", "10:00", lat, lon, ml, "10")
    }

    fn request(zoom: f64) -> FrameRequest {
        FrameRequest {
            bbox: BoundingBox::new(25.0, 35.0, 45.0, 43.0),
            zoom,
            marker_zoom: 1.0,
            display_limit: 100,
            high_magnitude_cutoff: 4.0,
            cluster: ClusterOptions::default(),
        }
    }

    #[test]
    fn test_high_magnitude_events_are_never_clustered() {
        let records = vec![
            quake("39.0", "35.0", "4.5"),
            quake("39.0", "35.0001", "5.2"),
            quake("39.0", "35.0002", "1.0"),
            quake("39.0", "35.0003", "1.5"),
        ];
        let frame = render_frame(&records, &request(3.0));

        assert_eq!(frame.bubbles.len(), 1);
        assert_eq!(frame.bubbles[0].member_count, 2);
        assert_eq!(frame.bubbles[0].size, 60.0, "bubble holds every visible clustered point");

        let indices: Vec<usize> = frame.markers.iter().map(|m| m.record_index).collect();
        assert_eq!(indices, vec![0, 1], "strongest marker is drawn last");
        assert_eq!(frame.markers[1].color, "#fc8d59");
        assert_eq!(frame.markers[1].z_index, 520);
    }

    #[test]
    fn test_singleton_clusters_render_as_markers() {
        let records = vec![quake("37.0", "28.0", "1.2"), quake("41.0", "42.0", "3.0")];
        let frame = render_frame(&records, &request(6.0));
        assert!(frame.bubbles.is_empty());
        assert_eq!(frame.markers.len(), 2);
        assert_eq!(frame.markers[1].color, "#fee08b");
        assert_eq!(frame.markers[1].size, visual::marker_size(3.0, 1.0));
    }

    #[test]
    fn test_invalid_and_out_of_view_events_are_skipped() {
        let records = vec![
            quake("", "35.0", "2.0"),
            quake("39.0", "35.0", "6.0"),
            quake("10.0", "100.0", "7.0"),
            quake("10.0", "100.0", "1.0"),
        ];
        let frame = render_frame(&records, &request(6.0));
        let indices: Vec<usize> = frame.markers.iter().map(|m| m.record_index).collect();
        assert_eq!(indices, vec![1]);
        assert!(frame.bubbles.is_empty());
    }

    #[test]
    fn test_initial_region_marker_size_uses_span_factor() {
        let records = vec![quake("39.0", "35.0", "2.0")];
        let req = FrameRequest::for_region(
            GeoPoint::new(39.0, 35.0),
            8.0,
            8.0,
            100,
            4.0,
            ClusterOptions::default(),
        );
        assert_eq!(req.zoom, 5.0);
        assert_eq!(req.marker_zoom, 1.25);

        let frame = render_frame(&records, &req);
        assert_eq!(frame.markers.len(), 1);
        // 20 * 1.25^-0.12, not the integer-zoom 20 * 5^-0.12 (about 16.5).
        assert!((frame.markers[0].size - 19.47).abs() < 0.01, "size {}", frame.markers[0].size);
    }

    #[test]
    fn test_display_limit_caps_the_dataset() {
        let records: Vec<EarthquakeRecord> =
            (0..10).map(|i| quake("39.0", &format!("{}", 27 + i), "2.0")).collect();
        let mut req = request(8.0);
        req.display_limit = 4;
        let frame = render_frame(&records, &req);
        assert_eq!(frame.markers.len(), 4);
    }
}

//! Marker and bubble encoding.
//!
//! All functions are pure and total: any `f64`, including negative values
//! and NaN, maps to a drawable result.

/// Smallest and largest marker diameters, in points.
pub const MIN_MARKER_SIZE: f64 = 12.0;
pub const MAX_MARKER_SIZE: f64 = 42.0;

/// Zoom range over which the size damping is applied.
const ZOOM_FLOOR: f64 = 0.5;
const ZOOM_CEIL: f64 = 20.0;
const ZOOM_DAMPING_EXPONENT: f64 = -0.12;

const BUBBLE_BASE_SIZE: f64 = 30.0;
const BUBBLE_SPAN: f64 = 30.0;

/// Severity bins for marker fill, ascending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// ML < 2
    Minor,
    /// 2 <= ML < 4
    Light,
    /// 4 <= ML < 6
    Moderate,
    /// ML >= 6
    Strong,
}

impl Severity {
    pub fn from_magnitude(magnitude: f64) -> Severity {
        // NaN fails every comparison and lands in the lowest bin.
        if magnitude >= 6.0 {
            Severity::Strong
        } else if magnitude >= 4.0 {
            Severity::Moderate
        } else if magnitude >= 2.0 {
            Severity::Light
        } else {
            Severity::Minor
        }
    }

    pub fn hex(&self) -> &'static str {
        match self {
            Severity::Minor => "#91cf60",
            Severity::Light => "#fee08b",
            Severity::Moderate => "#fc8d59",
            Severity::Strong => "#d73027",
        }
    }
}

/// Fill color for a marker of the given magnitude.
pub fn color(magnitude: f64) -> &'static str {
    Severity::from_magnitude(magnitude).hex()
}

/// Marker diameter: grows with magnitude, shrinks gently as the user zooms
/// in, and always stays within [`MIN_MARKER_SIZE`, `MAX_MARKER_SIZE`].
pub fn marker_size(magnitude: f64, zoom: f64) -> f64 {
    let magnitude = if magnitude.is_nan() { 0.0 } else { magnitude.max(0.0) };
    let zoom = if zoom.is_nan() { ZOOM_FLOOR } else { zoom.clamp(ZOOM_FLOOR, ZOOM_CEIL) };

    let base = 10.0 + 5.0 * magnitude;
    let dampen = zoom.powf(ZOOM_DAMPING_EXPONENT);
    (base * dampen).clamp(MIN_MARKER_SIZE, MAX_MARKER_SIZE)
}

/// Bubble diameter for a cluster, proportional to its share of the
/// currently visible clustered points.
pub fn cluster_bubble_size(member_count: usize, total_visible_points: usize) -> f64 {
    if total_visible_points == 0 {
        return BUBBLE_BASE_SIZE;
    }
    BUBBLE_BASE_SIZE + (member_count as f64 / total_visible_points as f64) * BUBBLE_SPAN
}

/// Core data types for the earthquake monitoring service.
///
/// This module defines the shared domain model imported by all other modules:
/// the normalized earthquake record, its identity key, geographic points,
/// alert thresholds, and the feed error type. Apart from the serde wire
/// struct it contains no I/O.

use serde::Deserialize;
use serde_json::Value;

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

/// One entry of the feed's JSON array, exactly as published.
///
/// The upstream collector writes Turkish field names; English aliases are
/// accepted so hand-written fixtures stay readable. Every value may arrive as
/// a string, a number, or null.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawQuakeRecord {
    #[serde(rename = "Yer", alias = "place", default)]
    pub place: Option<Value>,
    #[serde(rename = "Tarih", alias = "date", default)]
    pub date: Option<Value>,
    #[serde(rename = "Saat", alias = "time", default)]
    pub time: Option<Value>,
    #[serde(rename = "Enlem", alias = "latitude", default)]
    pub latitude: Option<Value>,
    #[serde(rename = "Boylam", alias = "longitude", default)]
    pub longitude: Option<Value>,
    #[serde(rename = "ML", alias = "ml", alias = "magnitude", default)]
    pub magnitude: Option<Value>,
    #[serde(rename = "Derinlik", alias = "depth", default)]
    pub depth: Option<Value>,
    #[serde(rename = "Kaynak", alias = "source", default)]
    pub source: Option<Value>,
    #[serde(rename = "Cozum", alias = "solution", default)]
    pub solution: Option<Value>,
}

/// Renders a JSON value as the literal text the feed carried.
///
/// Strings are returned without quotes, numbers as their JSON text, and
/// null/missing/compound values as the empty string.
pub fn raw_text(value: &Option<Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

/// Parses a locale-tolerant decimal ("4,2" or "4.2"). Returns `None` when the
/// text is not a finite number.
pub fn parse_decimal(text: &str) -> Option<f64> {
    let normalized = text.trim().replacen(',', ".", 1);
    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

// ---------------------------------------------------------------------------
// Normalized record
// ---------------------------------------------------------------------------

/// A single seismic event after best-effort numeric normalization.
///
/// The `*_raw` strings are the field values as published and are the only
/// inputs to [`EventKey`]; the numeric fields are derived from them.
#[derive(Debug, Clone, PartialEq)]
pub struct EarthquakeRecord {
    pub place: String,
    pub date: String,       // "YYYY-MM-DD"
    pub time: String,       // "HH:MM" or "HH:MM:SS"
    pub latitude_raw: String,
    pub longitude_raw: String,
    pub magnitude_raw: String,
    pub depth_raw: String,
    /// NaN when unparsable.
    pub latitude: f64,
    /// NaN when unparsable.
    pub longitude: f64,
    /// 0.0 when unparsable.
    pub magnitude: f64,
    /// NaN when unparsable.
    pub depth_km: f64,
    /// Reporting agency, e.g. "Kandilli" or "AFAD".
    pub source: Option<String>,
    /// Solution quality tag as reported by the agency.
    pub solution: Option<String>,
}

impl EarthquakeRecord {
    /// Normalizes a wire record. Never fails.
    pub fn from_raw(raw: &RawQuakeRecord) -> Self {
        let latitude_raw = raw_text(&raw.latitude);
        let longitude_raw = raw_text(&raw.longitude);
        let magnitude_raw = raw_text(&raw.magnitude);
        let depth_raw = raw_text(&raw.depth);
        let optional = |v: &Option<Value>| Some(raw_text(v)).filter(|s| !s.is_empty());

        EarthquakeRecord {
            place: raw_text(&raw.place),
            date: raw_text(&raw.date),
            time: raw_text(&raw.time),
            latitude: parse_decimal(&latitude_raw).unwrap_or(f64::NAN),
            longitude: parse_decimal(&longitude_raw).unwrap_or(f64::NAN),
            magnitude: parse_decimal(&magnitude_raw).unwrap_or(0.0),
            depth_km: parse_decimal(&depth_raw).unwrap_or(f64::NAN),
            latitude_raw,
            longitude_raw,
            magnitude_raw,
            depth_raw,
            source: optional(&raw.source),
            solution: optional(&raw.solution),
        }
    }

    /// Convenience constructor from raw strings, mostly for fixtures and
    /// dev replay.
    pub fn from_fields(
        place: &str,
        date: &str,
        time: &str,
        lat: &str,
        lon: &str,
        ml: &str,
        depth: &str,
    ) -> Self {
        let text = |s: &str| Some(Value::String(s.to_string()));
        Self::from_raw(&RawQuakeRecord {
            place: text(place),
            date: text(date),
            time: text(time),
            latitude: text(lat),
            longitude: text(lon),
            magnitude: text(ml),
            depth: text(depth),
            source: None,
            solution: None,
        })
    }

    /// Identity of this record for novelty detection.
    pub fn event_key(&self) -> EventKey {
        EventKey::new(
            &self.date,
            &self.time,
            &self.latitude_raw,
            &self.longitude_raw,
            &self.magnitude_raw,
        )
    }

    /// The epicenter, or `None` when either coordinate is not finite.
    pub fn location(&self) -> Option<GeoPoint> {
        GeoPoint::new(self.latitude, self.longitude).valid()
    }
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Derived event identity: date, time, latitude, longitude and magnitude as
/// literal strings joined with `|`.
///
/// Two records with identical raw fields share a key even when they describe
/// distinct physical events.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventKey(String);

impl EventKey {
    pub fn new(date: &str, time: &str, lat: &str, lon: &str, ml: &str) -> Self {
        EventKey(format!("{}|{}|{}|{}|{}", date, time, lat, lon, ml))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EventKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Geography
// ---------------------------------------------------------------------------

/// A WGS84 position in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        GeoPoint { lat, lon }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite() && self.lon.is_finite()
    }

    /// Returns `Some(self)` only when both coordinates are finite.
    pub fn valid(self) -> Option<Self> {
        self.is_valid().then_some(self)
    }
}

// ---------------------------------------------------------------------------
// Threshold types
// ---------------------------------------------------------------------------

/// User-configurable notification thresholds.
///
/// `min_magnitude` alerts regardless of location; `notify_magnitude_threshold`
/// only applies within `max_distance_km` of the user.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub min_magnitude: f64,
    pub notify_magnitude_threshold: f64,
    pub max_distance_km: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Thresholds {
            min_magnitude: 5.0,
            notify_magnitude_threshold: 3.0,
            max_distance_km: 400.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can arise when fetching or decoding the earthquake feed.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedError {
    /// Non-2xx HTTP response from the feed host.
    HttpError(u16),
    /// The request never produced a response (DNS, TLS, timeout, ...).
    Transport(String),
    /// The response body could not be deserialized.
    ParseError(String),
    /// A local replay file could not be read.
    Io(String),
}

impl std::fmt::Display for FeedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeedError::HttpError(code) => write!(f, "HTTP error: {}", code),
            FeedError::Transport(msg) => write!(f, "Transport error: {}", msg),
            FeedError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            FeedError::Io(msg) => write!(f, "IO error: {}", msg),
        }
    }
}

impl std::error::Error for FeedError {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

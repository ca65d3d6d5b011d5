/// Service configuration
///
/// Loaded from a TOML file (default `./quakemon.toml`, overridable with
/// `QUAKEMON_CONFIG`). Every key has a default, so a missing file or a
/// partial file is fine. A handful of deployment-specific values can also be
/// set from the environment (a `.env` file is honoured):
///
///   QUAKEMON_FEED_URL   feed endpoint
///   QUAKEMON_PUSH_URL   push relay base URL
///   QUAKEMON_LOG_FILE   append log lines to this file

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::ingest::collector::{AFAD_URL, DEFAULT_MAX_RECORDS, KANDILLI_URL};
use crate::ingest::feed::DEFAULT_FEED_URL;
use crate::map::cluster::ClusterOptions;
use crate::model::{GeoPoint, Thresholds};

pub const DEFAULT_CONFIG_PATH: &str = "./quakemon.toml";

/// Smaller merge radii cluster nothing on screen.
const MIN_PIXEL_RADIUS: f64 = 1.0;

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct FeedConfig {
    pub url: String,
    pub poll_interval_secs: u64,
    pub timeout_secs: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        FeedConfig {
            url: DEFAULT_FEED_URL.to_string(),
            poll_interval_secs: 15,
            timeout_secs: 30,
        }
    }
}

/// Build the feed from the agencies directly instead of `feed.url`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct CollectorConfig {
    pub enabled: bool,
    pub kandilli_url: String,
    pub afad_url: String,
    pub max_records: usize,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        CollectorConfig {
            enabled: false,
            kandilli_url: KANDILLI_URL.to_string(),
            afad_url: AFAD_URL.to_string(),
            max_records: DEFAULT_MAX_RECORDS,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct AlertConfig {
    pub min_magnitude: f64,
    pub notify_magnitude_threshold: f64,
    pub max_distance_km: f64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        let t = Thresholds::default();
        AlertConfig {
            min_magnitude: t.min_magnitude,
            notify_magnitude_threshold: t.notify_magnitude_threshold,
            max_distance_km: t.max_distance_km,
        }
    }
}

impl AlertConfig {
    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            min_magnitude: self.min_magnitude,
            notify_magnitude_threshold: self.notify_magnitude_threshold,
            max_distance_km: self.max_distance_km,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
pub struct LocationConfig {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct MapConfig {
    pub display_limit: usize,
    pub high_magnitude_threshold: f64,
    pub pixel_radius: f64,
    pub max_zoom: u8,
}

impl Default for MapConfig {
    fn default() -> Self {
        let cluster = ClusterOptions::default();
        MapConfig {
            display_limit: 100,
            high_magnitude_threshold: 4.0,
            pixel_radius: cluster.pixel_radius,
            max_zoom: cluster.max_zoom,
        }
    }
}

impl MapConfig {
    pub fn cluster_options(&self) -> ClusterOptions {
        ClusterOptions {
            pixel_radius: self.pixel_radius,
            max_zoom: self.max_zoom,
            ..ClusterOptions::default()
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct PushConfig {
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
    pub console_timestamps: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".to_string(),
            file: None,
            console_timestamps: true,
        }
    }
}

/// Offline replay instead of the live feed.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct DevConfig {
    pub replay_file: Option<String>,
    /// Records hidden at startup and revealed one step per poll.
    pub held_back: usize,
    pub reveal_per_poll: usize,
}

impl Default for DevConfig {
    fn default() -> Self {
        DevConfig {
            replay_file: None,
            held_back: 5,
            reveal_per_poll: 1,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServiceConfig {
    pub feed: FeedConfig,
    pub collector: CollectorConfig,
    pub alerts: AlertConfig,
    pub location: Option<LocationConfig>,
    pub map: MapConfig,
    pub push: PushConfig,
    pub logging: LoggingConfig,
    pub dev: DevConfig,
}

impl ServiceConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.feed.poll_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.feed.timeout_secs)
    }

    pub fn user_location(&self) -> Option<GeoPoint> {
        self.location.map(|l| GeoPoint::new(l.latitude, l.longitude))
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq)]
pub enum ConfigError {
    Io(String),
    Parse(String),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(msg) => write!(f, "Config IO error: {}", msg),
            ConfigError::Parse(msg) => write!(f, "Config parse error: {}", msg),
            ConfigError::Invalid(msg) => write!(f, "Invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Parses and validates a TOML document.
pub fn parse_config(text: &str) -> Result<ServiceConfig, ConfigError> {
    let config: ServiceConfig =
        toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
    validate(&config)?;
    Ok(config)
}

/// Reads the config file at `path`; a missing file yields defaults.
pub fn load_config_file(path: &Path) -> Result<ServiceConfig, ConfigError> {
    if !path.exists() {
        return Ok(ServiceConfig::default());
    }
    let text = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
    parse_config(&text)
}

/// Applies environment overrides through a lookup function so tests do not
/// have to touch the process environment.
pub fn apply_overrides<F>(config: &mut ServiceConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(url) = non_empty("QUAKEMON_FEED_URL") {
        config.feed.url = url;
    }
    if let Some(url) = non_empty("QUAKEMON_PUSH_URL") {
        config.push.base_url = Some(url);
    }
    if let Some(path) = non_empty("QUAKEMON_LOG_FILE") {
        config.logging.file = Some(path);
    }
}

/// Full startup load: `.env`, config file, environment overrides, validation.
pub fn load_config() -> Result<ServiceConfig, ConfigError> {
    dotenv::dotenv().ok();

    let path = std::env::var("QUAKEMON_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let mut config = load_config_file(Path::new(&path))?;
    apply_overrides(&mut config, |key| std::env::var(key).ok());
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &ServiceConfig) -> Result<(), ConfigError> {
    let invalid = |msg: String| Err(ConfigError::Invalid(msg));

    let a = &config.alerts;
    for (name, value) in [
        ("alerts.min_magnitude", a.min_magnitude),
        ("alerts.notify_magnitude_threshold", a.notify_magnitude_threshold),
        ("alerts.max_distance_km", a.max_distance_km),
    ] {
        if !value.is_finite() || value < 0.0 {
            return invalid(format!("{} must be a non-negative number, got {}", name, value));
        }
    }
    if a.max_distance_km == 0.0 {
        return invalid("alerts.max_distance_km must be greater than zero".to_string());
    }

    if config.feed.poll_interval_secs == 0 {
        return invalid("feed.poll_interval_secs must be at least 1".to_string());
    }
    if config.feed.url.trim().is_empty() {
        return invalid("feed.url must not be empty".to_string());
    }

    let c = &config.collector;
    if c.enabled {
        if c.kandilli_url.trim().is_empty() || c.afad_url.trim().is_empty() {
            return invalid("collector URLs must not be empty".to_string());
        }
        if c.max_records == 0 {
            return invalid("collector.max_records must be at least 1".to_string());
        }
    }

    if let Some(loc) = config.location {
        if !(-90.0..=90.0).contains(&loc.latitude) || !(-180.0..=180.0).contains(&loc.longitude) {
            return invalid(format!(
                "location ({}, {}) is outside WGS84 bounds",
                loc.latitude, loc.longitude
            ));
        }
    }

    let m = &config.map;
    if m.display_limit == 0 {
        return invalid("map.display_limit must be at least 1".to_string());
    }
    if !m.pixel_radius.is_finite() || m.pixel_radius < MIN_PIXEL_RADIUS {
        return invalid(format!(
            "map.pixel_radius must be at least {} pixel, got {}",
            MIN_PIXEL_RADIUS, m.pixel_radius
        ));
    }
    if m.max_zoom > 24 {
        return invalid(format!("map.max_zoom must be at most 24, got {}", m.max_zoom));
    }

    if config.dev.replay_file.is_some() && config.dev.reveal_per_poll == 0 {
        return invalid("dev.reveal_per_poll must be at least 1".to_string());
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

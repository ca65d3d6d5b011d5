/// Earthquake feed client
///
/// Retrieves the collector-published JSON array of recent earthquakes
/// (Kandilli + AFAD merged) from a static raw-content host. The host sits
/// behind a CDN, so every request carries a `t=<unix millis>` query parameter
/// and a `Cache-Control: no-cache` header to force a fresh copy.

use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::model::{EarthquakeRecord, FeedError, RawQuakeRecord};

pub const DEFAULT_FEED_URL: &str =
    "https://raw.githubusercontent.com/bedirhan327/deprem-veri-collector/main/public/data/deprem_data.json";

// ============================================================================
// Source abstraction
// ============================================================================

/// Anything that can produce a full snapshot of the feed.
pub trait FeedSource: Send + Sync {
    fn fetch(&self) -> Result<Vec<EarthquakeRecord>, FeedError>;

    /// Short label for log lines.
    fn describe(&self) -> String;
}

// ============================================================================
// URL / parsing helpers
// ============================================================================

/// Appends the cache-busting parameter for the given instant.
pub fn build_feed_url(base_url: &str, now: DateTime<Utc>) -> String {
    let separator = if base_url.contains('?') { '&' } else { '?' };
    format!("{}{}t={}", base_url, separator, now.timestamp_millis())
}

/// Decodes a feed body into normalized records, preserving feed order.
///
/// Only a body that is not a JSON array of objects is an error; individual
/// malformed fields degrade inside [`EarthquakeRecord::from_raw`].
pub fn parse_feed_response(body: &str) -> Result<Vec<EarthquakeRecord>, FeedError> {
    let raw: Vec<RawQuakeRecord> =
        serde_json::from_str(body).map_err(|e| FeedError::ParseError(e.to_string()))?;

    Ok(raw.iter().map(EarthquakeRecord::from_raw).collect())
}

// ============================================================================
// HTTP source
// ============================================================================

pub struct HttpFeedSource {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl HttpFeedSource {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, FeedError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FeedError::Transport(e.to_string()))?;

        Ok(HttpFeedSource {
            client,
            base_url: base_url.to_string(),
        })
    }

    /// Fetches the raw body once; shared with the verification report.
    pub fn fetch_body(&self) -> Result<String, FeedError> {
        let url = build_feed_url(&self.base_url, Utc::now());

        let response = self
            .client
            .get(&url)
            .header("Cache-Control", "no-cache")
            .header("Accept", "application/json")
            .send()
            .map_err(|e| FeedError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(FeedError::HttpError(response.status().as_u16()));
        }

        response.text().map_err(|e| FeedError::Transport(e.to_string()))
    }
}

impl FeedSource for HttpFeedSource {
    fn fetch(&self) -> Result<Vec<EarthquakeRecord>, FeedError> {
        let body = self.fetch_body()?;
        parse_feed_response(&body)
    }

    fn describe(&self) -> String {
        self.base_url.clone()
    }
}

// ============================================================================
// Tests
// ============================================================================

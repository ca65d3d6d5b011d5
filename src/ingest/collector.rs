/// Direct agency collector
///
/// Builds the merged feed without the published JSON mirror: scrapes the
/// Kandilli Observatory listing (`lst0.asp`, a fixed-width table inside a
/// `<pre>` block), reads the AFAD JSON endpoint, and merges both into the
/// history collected so far.
///
/// Merge rules:
///   - events are ordered by their date/time, earliest first, ties keep
///     collection order (history, then Kandilli, then AFAD)
///   - (date, time, latitude, longitude) identifies an event; the first
///     report of it wins, so the fastest agency's record is kept
///   - only the newest `max_records` events are retained, newest first
///   - events without a readable date/time are dropped

use chrono::{DateTime, NaiveDateTime};
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use crate::analysis::recency::event_time;
use crate::ingest::feed::FeedSource;
use crate::logging;
use crate::model::{parse_decimal, raw_text, EarthquakeRecord, FeedError, RawQuakeRecord};

pub const KANDILLI_URL: &str = "http://www.koeri.boun.edu.tr/scripts/lst0.asp";
pub const AFAD_URL: &str = "https://deprem.afad.gov.tr/last-earthquakes.json";
pub const DEFAULT_MAX_RECORDS: usize = 1000;

/// Kandilli marks a missing magnitude with this placeholder.
const MISSING_MAGNITUDE: &str = "-.-";

// ============================================================================
// Kandilli listing
// ============================================================================

fn pre_block(html: &str) -> Result<String, FeedError> {
    let re = Regex::new(r"(?is)<pre[^>]*>(.*?)</pre>")
        .map_err(|e| FeedError::ParseError(e.to_string()))?;
    let tags = Regex::new(r"<[^>]*>").map_err(|e| FeedError::ParseError(e.to_string()))?;

    let block = re
        .captures(html)
        .and_then(|c| c.get(1))
        .ok_or_else(|| FeedError::ParseError("Kandilli listing has no <pre> block".to_string()))?;

    Ok(tags.replace_all(block.as_str(), "").into_owned())
}

fn is_solution_token(token: &str) -> bool {
    token.starts_with("İlksel") || token.starts_with("Ilksel") || token.starts_with("REVIZE")
}

/// Parses one table row; header, separator and short lines yield `None`.
///
/// Columns: date, time, latitude, longitude, depth, MD, ML, Mw, place...,
/// solution. The solution may itself contain spaces (`REVIZE01 (...)`).
fn parse_kandilli_line(line: &str) -> Option<EarthquakeRecord> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 9 {
        return None;
    }
    chrono::NaiveDate::parse_from_str(parts[0], "%Y.%m.%d").ok()?;

    let latitude = parse_decimal(parts[2])?;
    let longitude = parse_decimal(parts[3])?;
    let magnitude = match parts[6] {
        MISSING_MAGNITUDE => Value::Null,
        ml => Value::String(ml.to_string()),
    };

    let solution_at = (9..parts.len())
        .find(|&i| is_solution_token(parts[i]))
        .unwrap_or(parts.len() - 1);
    let place = parts[8..solution_at].join(" ");
    // Mis-decoded dotted capital I in the agency's encoding.
    let solution = parts[solution_at..].join(" ").replace('\u{FFFD}', "İ");

    Some(EarthquakeRecord::from_raw(&RawQuakeRecord {
        place: Some(Value::String(place)),
        date: Some(Value::String(parts[0].to_string())),
        time: Some(Value::String(parts[1].to_string())),
        latitude: Some(Value::from(latitude)),
        longitude: Some(Value::from(longitude)),
        magnitude: Some(magnitude),
        depth: Some(Value::String(parts[4].to_string())),
        source: Some(Value::String("Kandilli".to_string())),
        solution: Some(Value::String(solution)),
    }))
}

/// Extracts every event row from a `lst0.asp` page, in listing order.
pub fn parse_kandilli_listing(html: &str) -> Result<Vec<EarthquakeRecord>, FeedError> {
    let block = pre_block(html)?;
    Ok(block.lines().filter_map(parse_kandilli_line).collect())
}

// ============================================================================
// AFAD JSON
// ============================================================================

#[derive(Debug, Deserialize)]
struct AfadResponse {
    #[serde(default)]
    earthquakes: Vec<AfadEvent>,
}

#[derive(Debug, Deserialize)]
struct AfadEvent {
    /// Unix seconds, UTC.
    timestamp: i64,
    latitude: Option<Value>,
    longitude: Option<Value>,
    depth: Option<Value>,
    ml: Option<Value>,
    location: Option<String>,
}

/// Decodes the AFAD response. Events with an out-of-range timestamp or
/// unreadable coordinates are dropped.
pub fn parse_afad_response(body: &str) -> Result<Vec<EarthquakeRecord>, FeedError> {
    let response: AfadResponse =
        serde_json::from_str(body).map_err(|e| FeedError::ParseError(e.to_string()))?;

    let records = response
        .earthquakes
        .into_iter()
        .filter_map(|event| {
            let at = DateTime::from_timestamp(event.timestamp, 0)?;
            let latitude = parse_decimal(&raw_text(&event.latitude))?;
            let longitude = parse_decimal(&raw_text(&event.longitude))?;

            Some(EarthquakeRecord::from_raw(&RawQuakeRecord {
                place: Some(Value::String(event.location.unwrap_or_default())),
                date: Some(Value::String(at.format("%Y-%m-%d").to_string())),
                time: Some(Value::String(at.format("%H:%M:%S").to_string())),
                latitude: Some(Value::from(latitude)),
                longitude: Some(Value::from(longitude)),
                magnitude: event.ml,
                depth: Some(event.depth.unwrap_or_else(|| Value::String(String::new()))),
                source: Some(Value::String("AFAD".to_string())),
                solution: None,
            }))
        })
        .collect();

    Ok(records)
}

// ============================================================================
// Merge
// ============================================================================

/// Applies the merge rules to `batches`, given in collection order. Events
/// without a usable date/time cannot be ordered and are dropped.
pub fn merge_snapshots(batches: &[&[EarthquakeRecord]], max_records: usize) -> Vec<EarthquakeRecord> {
    let mut timed: Vec<(NaiveDateTime, &EarthquakeRecord)> = batches
        .iter()
        .flat_map(|batch| batch.iter())
        .filter_map(|r| event_time(r).map(|t| (t, r)))
        .collect();
    timed.sort_by_key(|(t, _)| *t);

    let mut seen = HashSet::new();
    let mut merged: Vec<EarthquakeRecord> = timed
        .into_iter()
        .map(|(_, r)| r)
        .filter(|r| {
            seen.insert((
                r.date.clone(),
                r.time.clone(),
                r.latitude_raw.clone(),
                r.longitude_raw.clone(),
            ))
        })
        .cloned()
        .collect();

    let excess = merged.len().saturating_sub(max_records);
    merged.drain(..excess);
    merged.reverse();
    merged
}

// ============================================================================
// Source
// ============================================================================

pub struct CollectorFeedSource {
    client: reqwest::blocking::Client,
    kandilli_url: String,
    afad_url: String,
    max_records: usize,
    collected: Mutex<Vec<EarthquakeRecord>>,
}

impl CollectorFeedSource {
    pub fn new(
        kandilli_url: &str,
        afad_url: &str,
        max_records: usize,
        timeout: Duration,
    ) -> Result<Self, FeedError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FeedError::Transport(e.to_string()))?;

        Ok(CollectorFeedSource {
            client,
            kandilli_url: kandilli_url.to_string(),
            afad_url: afad_url.to_string(),
            max_records,
            collected: Mutex::new(Vec::new()),
        })
    }

    fn get_text(&self, url: &str) -> Result<String, FeedError> {
        let response = self
            .client
            .get(url)
            .header("Cache-Control", "no-cache")
            .send()
            .map_err(|e| FeedError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(FeedError::HttpError(response.status().as_u16()));
        }

        // The listing is served without a reliable charset.
        response
            .text_with_charset("utf-8")
            .map_err(|e| FeedError::Transport(e.to_string()))
    }

    fn fetch_kandilli(&self) -> Result<Vec<EarthquakeRecord>, FeedError> {
        parse_kandilli_listing(&self.get_text(&self.kandilli_url)?)
    }

    fn fetch_afad(&self) -> Result<Vec<EarthquakeRecord>, FeedError> {
        parse_afad_response(&self.get_text(&self.afad_url)?)
    }

    /// Merges fresh agency batches into the collected history. One agency
    /// failing is logged and tolerated; both failing is an error and leaves
    /// the history untouched.
    pub fn absorb(
        &self,
        kandilli: Result<Vec<EarthquakeRecord>, FeedError>,
        afad: Result<Vec<EarthquakeRecord>, FeedError>,
    ) -> Result<Vec<EarthquakeRecord>, FeedError> {
        let (kandilli, afad) = match (kandilli, afad) {
            (Err(k), Err(a)) => {
                logging::log_feed_failure(&self.afad_url, "AFAD fetch", &a);
                return Err(k);
            }
            (Err(k), Ok(a)) => {
                logging::log_feed_failure(&self.kandilli_url, "Kandilli fetch", &k);
                (Vec::new(), a)
            }
            (Ok(k), Err(a)) => {
                logging::log_feed_failure(&self.afad_url, "AFAD fetch", &a);
                (k, Vec::new())
            }
            (Ok(k), Ok(a)) => (k, a),
        };

        let mut collected = self.collected.lock().unwrap_or_else(PoisonError::into_inner);
        let merged = merge_snapshots(
            &[collected.as_slice(), kandilli.as_slice(), afad.as_slice()],
            self.max_records,
        );
        *collected = merged.clone();
        Ok(merged)
    }
}

impl FeedSource for CollectorFeedSource {
    fn fetch(&self) -> Result<Vec<EarthquakeRecord>, FeedError> {
        self.absorb(self.fetch_kandilli(), self.fetch_afad())
    }

    fn describe(&self) -> String {
        "collector:kandilli+afad".to_string()
    }
}

// ============================================================================
// Tests
// ============================================================================

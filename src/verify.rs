//! Feed Verification Module
//!
//! One-shot health check of the configured feed: is it reachable, does it
//! decode, and how clean is the data? Run with `quakemon --verify` before
//! pointing the poller at a new mirror.

use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::analysis::recency::newest_event_time;
use crate::ingest::feed::FeedSource;
use crate::model::{parse_decimal, EarthquakeRecord};

// ============================================================================
// Verification Results
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum VerificationStatus {
    Success,
    PartialSuccess,
    Failed,
}

/// Data-quality counters for one snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RecordQuality {
    pub record_count: usize,
    pub invalid_coordinates: usize,
    pub unparsable_magnitudes: usize,
    /// Records whose event key was already used earlier in the snapshot.
    pub duplicate_keys: usize,
    pub newest_event: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedVerification {
    pub timestamp: String,
    pub source: String,
    pub status: VerificationStatus,
    pub quality: RecordQuality,
    pub error_message: Option<String>,
}

// ============================================================================
// Analysis
// ============================================================================

pub fn analyze_records(records: &[EarthquakeRecord]) -> RecordQuality {
    let mut seen = HashSet::new();
    let mut quality = RecordQuality {
        record_count: records.len(),
        newest_event: newest_event_time(records),
        ..RecordQuality::default()
    };

    for record in records {
        if record.location().is_none() {
            quality.invalid_coordinates += 1;
        }
        if parse_decimal(&record.magnitude_raw).is_none() {
            quality.unparsable_magnitudes += 1;
        }
        if !seen.insert(record.event_key()) {
            quality.duplicate_keys += 1;
        }
    }

    quality
}

/// Success when every record is clean, PartialSuccess when some records
/// have problems (or the feed is empty), Failed only if nothing was usable.
pub fn classify_quality(quality: &RecordQuality) -> VerificationStatus {
    let problems = quality.invalid_coordinates + quality.unparsable_magnitudes + quality.duplicate_keys;
    let clean_positions = quality.record_count - quality.invalid_coordinates.min(quality.record_count);

    if quality.record_count == 0 {
        VerificationStatus::PartialSuccess
    } else if clean_positions == 0 {
        VerificationStatus::Failed
    } else if problems > 0 {
        VerificationStatus::PartialSuccess
    } else {
        VerificationStatus::Success
    }
}

// ============================================================================
// Runner
// ============================================================================

pub fn verify_feed(source: &dyn FeedSource) -> FeedVerification {
    let mut result = FeedVerification {
        timestamp: Utc::now().to_rfc3339(),
        source: source.describe(),
        status: VerificationStatus::Failed,
        quality: RecordQuality::default(),
        error_message: None,
    };

    match source.fetch() {
        Ok(records) => {
            result.quality = analyze_records(&records);
            result.status = classify_quality(&result.quality);
        }
        Err(e) => {
            result.error_message = Some(e.to_string());
        }
    }

    result
}

pub fn print_summary(report: &FeedVerification) {
    println!("\n═══════════════════════════════════════════════════════════");
    println!("📊 FEED VERIFICATION");
    println!("═══════════════════════════════════════════════════════════");
    println!();
    println!("Source:               {}", report.source);

    let q = &report.quality;
    match report.status {
        VerificationStatus::Success => println!("Status:               ✓ OK"),
        VerificationStatus::PartialSuccess => println!("Status:               ⚠ Partial"),
        VerificationStatus::Failed => println!(
            "Status:               ✗ FAILED: {}",
            report.error_message.as_deref().unwrap_or("no usable records")
        ),
    }

    if report.error_message.is_none() {
        println!("Records:              {}", q.record_count);
        println!("Invalid coordinates:  {}", q.invalid_coordinates);
        println!("Unparsable ML:        {}", q.unparsable_magnitudes);
        println!("Duplicate keys:       {}", q.duplicate_keys);
        match q.newest_event {
            Some(t) => println!("Newest event:         {}", t),
            None => println!("Newest event:         unknown"),
        }
    }
    println!("═══════════════════════════════════════════════════════════");
}

/// Live feed checks against the published collector output
///
/// These tests make real HTTP requests and are ignored by default.
///
/// Run with: cargo test --test feed_live -- --ignored --nocapture

use std::time::Duration;

use quakemon_service::ingest::feed::{FeedSource, HttpFeedSource, DEFAULT_FEED_URL};
use quakemon_service::verify::{verify_feed, VerificationStatus};

fn live_source() -> HttpFeedSource {
    let url = std::env::var("QUAKEMON_FEED_URL").unwrap_or_else(|_| DEFAULT_FEED_URL.to_string());
    HttpFeedSource::new(&url, Duration::from_secs(30)).expect("client should build")
}

#[test]
#[ignore]
fn test_live_feed_returns_records() {
    let records = live_source().fetch().expect("live feed should be reachable");

    println!("\n🔍 Live feed: {} records", records.len());
    for record in records.iter().take(5) {
        println!("  {} {} ML {} {}", record.date, record.time, record.magnitude_raw, record.place);
    }

    assert!(!records.is_empty(), "collector output should not be empty");
    assert!(
        records.iter().any(|r| r.location().is_some()),
        "at least some records should carry coordinates"
    );
}

#[test]
#[ignore]
fn test_live_feed_verification() {
    let report = verify_feed(&live_source());
    quakemon_service::verify::print_summary(&report);
    assert_ne!(report.status, VerificationStatus::Failed, "{:?}", report.error_message);
}

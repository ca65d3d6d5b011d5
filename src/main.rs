/// quakemon: earthquake feed poller and alert service
///
/// Usage:
///   quakemon              poll the feed until the process is stopped
///   quakemon --once       one fetch, print status and map summary, exit
///   quakemon --verify     check the configured feed and print a report
///   quakemon --push-test  send a test broadcast through the push relay
///   quakemon --push-register <token>
///                         register a device token with the push relay

use std::error::Error;
use std::path::Path;
use std::sync::atomic::AtomicBool;

use quakemon_service::alert::location::FixedLocation;
use quakemon_service::alert::notifier::LogNotifier;
use quakemon_service::alert::push::{DeviceInfo, HttpPushTransport, PushTransport};
use quakemon_service::config::{self, ServiceConfig};
use quakemon_service::dev_mode::ReplayFeedSource;
use quakemon_service::ingest::collector::CollectorFeedSource;
use quakemon_service::ingest::feed::{FeedSource, HttpFeedSource};
use quakemon_service::ingest::poller::{IngestionSession, PollOutcome, Poller};
use quakemon_service::logging::{self, DataSource, LogLevel};
use quakemon_service::map::{render_frame, FrameRequest};
use quakemon_service::model::GeoPoint;
use quakemon_service::verify;

/// Initial map region: central Anatolia, 8° each way.
const INITIAL_CENTER: GeoPoint = GeoPoint { lat: 39.0, lon: 35.0 };
const INITIAL_DELTA: f64 = 8.0;

#[derive(Debug, Clone, PartialEq)]
enum Mode {
    Run,
    Once,
    Verify,
    PushTest,
    PushRegister(String),
}

fn parse_mode(args: &[String]) -> Result<Mode, String> {
    match args.get(1).map(String::as_str) {
        None => Ok(Mode::Run),
        Some("--once") => Ok(Mode::Once),
        Some("--verify") => Ok(Mode::Verify),
        Some("--push-test") => Ok(Mode::PushTest),
        Some("--push-register") => match args.get(2) {
            Some(token) if !token.trim().is_empty() => Ok(Mode::PushRegister(token.clone())),
            _ => Err("--push-register needs a device token".to_string()),
        },
        Some(other) => Err(format!("unknown argument: {}", other)),
    }
}

fn build_feed_source(config: &ServiceConfig) -> Result<Box<dyn FeedSource>, Box<dyn Error>> {
    match &config.dev.replay_file {
        Some(path) => {
            logging::warn(DataSource::System, None, &format!("DEV MODE: replaying {}", path));
            let replay = ReplayFeedSource::from_file(
                Path::new(path),
                config.dev.held_back,
                config.dev.reveal_per_poll,
            )?;
            Ok(Box::new(replay))
        }
        None if config.collector.enabled => {
            let c = &config.collector;
            let collector = CollectorFeedSource::new(
                &c.kandilli_url,
                &c.afad_url,
                c.max_records,
                config.request_timeout(),
            )?;
            Ok(Box::new(collector))
        }
        None => Ok(Box::new(HttpFeedSource::new(&config.feed.url, config.request_timeout())?)),
    }
}

fn build_poller(config: &ServiceConfig) -> Result<Poller, Box<dyn Error>> {
    Ok(Poller::new(
        build_feed_source(config)?,
        Box::new(LogNotifier),
        Box::new(FixedLocation(config.user_location())),
        IngestionSession::shared(),
        config.alerts.thresholds(),
        config.poll_interval(),
    ))
}

fn run_once(config: &ServiceConfig) -> Result<(), Box<dyn Error>> {
    let poller = build_poller(config)?;
    let outcome = poller.poll_once()?;
    println!("Outcome: {:?}", outcome);

    let session = poller.session();
    let session = session.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    let status = session.status();
    println!("Records:      {}", status.total_records);
    match status.newest_event {
        Some(t) => println!("Newest event: {}", t),
        None => println!("Newest event: unknown"),
    }

    let request = FrameRequest::for_region(
        INITIAL_CENTER,
        INITIAL_DELTA,
        INITIAL_DELTA,
        config.map.display_limit,
        config.map.high_magnitude_threshold,
        config.map.cluster_options(),
    );
    let frame = render_frame(session.snapshot(), &request);
    logging::info(
        DataSource::Map,
        None,
        &format!("Initial region: {} markers, {} clusters", frame.markers.len(), frame.bubbles.len()),
    );

    if matches!(outcome, PollOutcome::Stale | PollOutcome::Skipped) {
        logging::warn(DataSource::Feed, None, "Single poll did not apply a snapshot");
    }
    Ok(())
}

fn run_verify(config: &ServiceConfig) -> Result<(), Box<dyn Error>> {
    let source = build_feed_source(config)?;
    println!("🔍 Verifying {} ...", source.describe());
    let report = verify::verify_feed(source.as_ref());
    verify::print_summary(&report);

    if report.status == verify::VerificationStatus::Failed {
        return Err("feed verification failed".into());
    }
    Ok(())
}

fn push_transport(config: &ServiceConfig) -> Result<(HttpPushTransport, &str), Box<dyn Error>> {
    let base_url = config
        .push
        .base_url
        .as_deref()
        .ok_or("push.base_url is not configured (or set QUAKEMON_PUSH_URL)")?;
    Ok((HttpPushTransport::new(base_url, config.request_timeout())?, base_url))
}

/// Metadata for the machine running the daemon.
fn this_device() -> DeviceInfo {
    DeviceInfo {
        platform: std::env::consts::OS.to_string(),
        model_name: Some(format!("quakemon {}", env!("CARGO_PKG_VERSION"))),
        os_version: None,
    }
}

fn run_push_register(config: &ServiceConfig, token: &str) -> Result<(), Box<dyn Error>> {
    let (transport, base_url) = push_transport(config)?;
    transport.register(token, &this_device())?;
    logging::info(DataSource::Push, Some(base_url), "Device token registered");
    Ok(())
}

fn run_push_test(config: &ServiceConfig) -> Result<(), Box<dyn Error>> {
    let (transport, base_url) = push_transport(config)?;
    let report = transport.broadcast("Test notification", "quakemon push relay check")?;
    logging::info(DataSource::Push, Some(base_url), &report.to_string());
    println!("{}", report);
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let args: Vec<String> = std::env::args().collect();
    let mode = parse_mode(&args)?;

    let config = config::load_config()?;
    logging::init_logger(
        LogLevel::from_name(&config.logging.level),
        config.logging.file.as_deref(),
        config.logging.console_timestamps,
    );

    match mode {
        Mode::Once => run_once(&config),
        Mode::Verify => run_verify(&config),
        Mode::PushTest => run_push_test(&config),
        Mode::PushRegister(token) => run_push_register(&config, &token),
        Mode::Run => {
            logging::info(DataSource::System, None, "🌍 quakemon starting");
            if config.user_location().is_none() {
                logging::warn(
                    DataSource::Alert,
                    None,
                    "No [location] configured; only magnitude alerts will fire",
                );
            }
            let poller = build_poller(&config)?;
            let stop = AtomicBool::new(false);
            poller.run(&stop);
            Ok(())
        }
    }
}

//! Feed polling loop.
//!
//! One thread drives a fixed-interval loop; the blocking HTTP fetch is the
//! only slow step. All mutable ingestion state lives in an
//! [`IngestionSession`] created once at startup and shared by `Arc`.
//!
//! # Ordering
//! Every fetch draws a sequence number from the session before the network
//! call, and a response is applied only if it is newer than the last applied
//! one. A slow response can therefore never overwrite a fresher snapshot,
//! even when several callers (the scheduled loop and a manual refresh) share
//! one session. Each `Poller` additionally skips a tick while its own
//! previous fetch is still in flight.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::alert::location::LocationProvider;
use crate::alert::notifier::{compose_message, Notifier};
use crate::alert::thresholds::decide_all;
use crate::analysis::novelty::NoveltyTracker;
use crate::analysis::recency::newest_event_time;
use crate::ingest::feed::FeedSource;
use crate::logging::{self, DataSource};
use crate::model::{EarthquakeRecord, FeedError, Thresholds};

/// Upper bound on how long `run` sleeps before re-checking its stop flag.
const STOP_CHECK_SLICE: Duration = Duration::from_millis(250);

// ---------------------------------------------------------------------------
// Session state
// ---------------------------------------------------------------------------

/// Observability snapshot for the status display.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PollStatus {
    pub last_fetch: Option<DateTime<Utc>>,
    /// New events found by the last applied poll.
    pub new_count: usize,
    pub total_records: usize,
    pub newest_event: Option<NaiveDateTime>,
    pub applied_seq: u64,
}

/// Sequence number handed out before a fetch starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FetchTicket(u64);

impl FetchTicket {
    pub fn seq(&self) -> u64 {
        self.0
    }
}

/// What happened when a fetched snapshot was offered to the session.
#[derive(Debug, PartialEq)]
pub enum ApplyResult {
    /// First snapshot: seen-set seeded, nothing reported.
    Baseline,
    /// Snapshot applied; these records were never seen before.
    Fresh(Vec<EarthquakeRecord>),
    /// A newer snapshot was already applied; this one was discarded.
    Stale,
}

/// Process-wide ingestion state: seen-set, current dataset, status.
#[derive(Debug, Default)]
pub struct IngestionSession {
    tracker: NoveltyTracker,
    snapshot: Vec<EarthquakeRecord>,
    status: PollStatus,
    issued_seq: u64,
}

impl IngestionSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Mutex<IngestionSession>> {
        Arc::new(Mutex::new(Self::new()))
    }

    pub fn begin_fetch(&mut self) -> FetchTicket {
        self.issued_seq += 1;
        FetchTicket(self.issued_seq)
    }

    /// Replaces the dataset wholesale and classifies it, unless a newer
    /// ticket has already been applied.
    pub fn apply(
        &mut self,
        ticket: FetchTicket,
        records: Vec<EarthquakeRecord>,
        fetched_at: DateTime<Utc>,
    ) -> ApplyResult {
        if ticket.0 <= self.status.applied_seq {
            return ApplyResult::Stale;
        }

        let is_baseline = !self.tracker.is_baseline_established();
        let fresh = self.tracker.classify(&records);

        self.status = PollStatus {
            last_fetch: Some(fetched_at),
            new_count: fresh.len(),
            total_records: records.len(),
            newest_event: newest_event_time(&records),
            applied_seq: ticket.0,
        };
        self.snapshot = records;

        if is_baseline {
            ApplyResult::Baseline
        } else {
            ApplyResult::Fresh(fresh)
        }
    }

    pub fn snapshot(&self) -> &[EarthquakeRecord] {
        &self.snapshot
    }

    pub fn status(&self) -> &PollStatus {
        &self.status
    }

    pub fn tracker(&self) -> &NoveltyTracker {
        &self.tracker
    }
}

// ---------------------------------------------------------------------------
// Poller
// ---------------------------------------------------------------------------

/// Result of one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Baseline { records: usize },
    Applied { records: usize, new_events: usize, alerts_sent: usize },
    /// Discarded because a newer response had already been applied.
    Stale,
    /// Not attempted because this poller's previous fetch was still running.
    Skipped,
}

/// Clears the in-flight flag when the tick ends, including by panic.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct Poller {
    source: Box<dyn FeedSource>,
    notifier: Box<dyn Notifier>,
    location: Box<dyn LocationProvider>,
    session: Arc<Mutex<IngestionSession>>,
    thresholds: Mutex<Thresholds>,
    interval: Duration,
    in_flight: AtomicBool,
}

impl Poller {
    pub fn new(
        source: Box<dyn FeedSource>,
        notifier: Box<dyn Notifier>,
        location: Box<dyn LocationProvider>,
        session: Arc<Mutex<IngestionSession>>,
        thresholds: Thresholds,
        interval: Duration,
    ) -> Self {
        Poller {
            source,
            notifier,
            location,
            session,
            thresholds: Mutex::new(thresholds),
            interval,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn session(&self) -> Arc<Mutex<IngestionSession>> {
        Arc::clone(&self.session)
    }

    pub fn thresholds(&self) -> Thresholds {
        *self.thresholds.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Takes effect from the next applied poll.
    pub fn set_thresholds(&self, thresholds: Thresholds) {
        *self.thresholds.lock().unwrap_or_else(PoisonError::into_inner) = thresholds;
    }

    fn lock_session(&self) -> MutexGuard<'_, IngestionSession> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs one fetch → classify → alert cycle.
    ///
    /// Fetch and parse failures are logged and returned; the session is left
    /// untouched so the last good dataset keeps being served.
    pub fn poll_once(&self) -> Result<PollOutcome, FeedError> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            logging::debug(DataSource::Feed, None, "Previous fetch still in flight, skipping tick");
            return Ok(PollOutcome::Skipped);
        }
        let _guard = InFlight(&self.in_flight);

        let ticket = self.lock_session().begin_fetch();

        let records = match self.source.fetch() {
            Ok(records) => records,
            Err(e) => {
                logging::log_feed_failure(&self.source.describe(), "Feed fetch", &e);
                return Err(e);
            }
        };
        let total = records.len();

        // The lock is released before notifying so status readers never wait
        // on a slow notifier.
        let applied = self.lock_session().apply(ticket, records, Utc::now());

        match applied {
            ApplyResult::Stale => {
                logging::warn(
                    DataSource::Feed,
                    Some(&format!("seq {}", ticket.seq())),
                    "Discarded out-of-order response",
                );
                Ok(PollOutcome::Stale)
            }
            ApplyResult::Baseline => {
                logging::info(
                    DataSource::Feed,
                    None,
                    &format!("Baseline established with {} records", total),
                );
                Ok(PollOutcome::Baseline { records: total })
            }
            ApplyResult::Fresh(new_records) => {
                let alerts_sent = self.dispatch_alerts(&new_records);
                logging::log_poll_summary(total, new_records.len(), alerts_sent);
                Ok(PollOutcome::Applied {
                    records: total,
                    new_events: new_records.len(),
                    alerts_sent,
                })
            }
        }
    }

    fn dispatch_alerts(&self, new_records: &[EarthquakeRecord]) -> usize {
        if new_records.is_empty() {
            return 0;
        }

        let user = self.location.current_location();
        let thresholds = self.thresholds();
        let mut sent = 0;

        for decision in decide_all(new_records, user, &thresholds) {
            let Some(reason) = decision.reason else {
                continue;
            };
            let message = compose_message(decision.record, reason);
            let key = decision.record.event_key();

            match self.notifier.notify(&message.title, &message.body) {
                Ok(()) => {
                    sent += 1;
                    logging::debug(DataSource::Alert, Some(key.as_str()), &format!("{:?}", reason));
                }
                Err(e) => logging::error(DataSource::Alert, Some(key.as_str()), &e.to_string()),
            }
        }

        sent
    }

    /// Polls on a fixed cadence until `stop` is set. The first tick runs
    /// immediately.
    pub fn run(&self, stop: &AtomicBool) {
        logging::info(
            DataSource::Feed,
            None,
            &format!(
                "Polling {} every {}s",
                self.source.describe(),
                self.interval.as_secs()
            ),
        );

        while !stop.load(Ordering::Relaxed) {
            let started = Instant::now();
            // Failures are already logged inside poll_once.
            let _ = self.poll_once();

            while !stop.load(Ordering::Relaxed) {
                let elapsed = started.elapsed();
                if elapsed >= self.interval {
                    break;
                }
                thread::sleep((self.interval - elapsed).min(STOP_CHECK_SLICE));
            }
        }

        logging::info(DataSource::Feed, None, "Poller stopped");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::location::FixedLocation;
    use crate::alert::notifier::NotifyError;
    use crate::model::GeoPoint;
    use chrono::TimeZone;
    use std::collections::VecDeque;
    use std::sync::mpsc;

    fn quake(time: &str, ml: &str) -> EarthquakeRecord {
        EarthquakeRecord::from_fields("TEST", "2025-01-01", time, "39.0", "35.0", ml, "10")
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 10, 30, 0).unwrap()
    }

    /// Replays a fixed script of fetch results, then repeats the last one.
    struct ScriptedFeed {
        script: Mutex<VecDeque<Result<Vec<EarthquakeRecord>, FeedError>>>,
    }

    impl ScriptedFeed {
        fn new(script: Vec<Result<Vec<EarthquakeRecord>, FeedError>>) -> Self {
            ScriptedFeed { script: Mutex::new(script.into()) }
        }
    }

    impl FeedSource for ScriptedFeed {
        fn fetch(&self) -> Result<Vec<EarthquakeRecord>, FeedError> {
            let mut script = self.script.lock().unwrap();
            if script.len() > 1 {
                script.pop_front().unwrap()
            } else {
                match script.front() {
                    Some(Ok(records)) => Ok(records.clone()),
                    Some(Err(e)) => Err(FeedError::Transport(e.to_string())),
                    None => Ok(Vec::new()),
                }
            }
        }

        fn describe(&self) -> String {
            "scripted".to_string()
        }
    }

    #[derive(Clone, Default)]
    struct RecordingNotifier {
        sent: Arc<Mutex<Vec<(String, String)>>>,
        fail: bool,
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, title: &str, body: &str) -> Result<(), NotifyError> {
            if self.fail {
                return Err(NotifyError("permission denied".to_string()));
            }
            self.sent.lock().unwrap().push((title.to_string(), body.to_string()));
            Ok(())
        }
    }

    fn poller_with(feed: impl FeedSource + 'static, notifier: RecordingNotifier) -> Poller {
        Poller::new(
            Box::new(feed),
            Box::new(notifier),
            Box::new(FixedLocation(Some(GeoPoint::new(39.0, 35.0)))),
            IngestionSession::shared(),
            Thresholds {
                min_magnitude: 6.0,
                notify_magnitude_threshold: 3.0,
                max_distance_km: 400.0,
            },
            Duration::from_secs(15),
        )
    }

    // --- Session ----------------------------------------------------------

    #[test]
    fn test_first_apply_is_baseline() {
        let mut session = IngestionSession::new();
        let ticket = session.begin_fetch();
        let result = session.apply(ticket, vec![quake("10:00", "6.2")], fixed_now());

        assert_eq!(result, ApplyResult::Baseline);
        assert_eq!(session.status().new_count, 0);
        assert_eq!(session.status().total_records, 1);
        assert_eq!(session.status().last_fetch, Some(fixed_now()));
        assert_eq!(session.snapshot().len(), 1);
    }

    #[test]
    fn test_out_of_order_response_is_discarded() {
        let mut session = IngestionSession::new();
        let slow = session.begin_fetch();
        let fast = session.begin_fetch();
        assert!(slow < fast);

        let newer = vec![quake("10:00", "2.0"), quake("10:05", "3.0")];
        assert_eq!(session.apply(fast, newer, fixed_now()), ApplyResult::Baseline);

        let older = vec![quake("10:00", "2.0")];
        assert_eq!(session.apply(slow, older, fixed_now()), ApplyResult::Stale);
        assert_eq!(session.snapshot().len(), 2, "stale snapshot must not replace newer one");
        assert_eq!(session.status().applied_seq, fast.seq());
    }

    #[test]
    fn test_same_ticket_cannot_apply_twice() {
        let mut session = IngestionSession::new();
        let ticket = session.begin_fetch();
        session.apply(ticket, vec![], fixed_now());
        assert_eq!(session.apply(ticket, vec![quake("10:00", "2.0")], fixed_now()), ApplyResult::Stale);
    }

    #[test]
    fn test_dataset_is_replaced_not_merged() {
        let mut session = IngestionSession::new();
        let t1 = session.begin_fetch();
        session.apply(t1, vec![quake("10:00", "2.0"), quake("10:01", "2.0")], fixed_now());
        let t2 = session.begin_fetch();
        session.apply(t2, vec![quake("10:02", "2.0")], fixed_now());

        assert_eq!(session.snapshot().len(), 1);
        assert_eq!(session.tracker().seen_count(), 3);
    }

    // --- Poller -----------------------------------------------------------

    #[test]
    fn test_baseline_then_new_event_alerts() {
        let base = vec![quake("10:00", "6.2")];
        let mut grown = base.clone();
        grown.insert(0, quake("10:05", "4.1"));

        let notifier = RecordingNotifier::default();
        let poller = poller_with(
            ScriptedFeed::new(vec![Ok(base.clone()), Ok(base), Ok(grown)]),
            notifier.clone(),
        );

        assert_eq!(poller.poll_once(), Ok(PollOutcome::Baseline { records: 1 }));
        assert_eq!(
            poller.poll_once(),
            Ok(PollOutcome::Applied { records: 1, new_events: 0, alerts_sent: 0 })
        );
        assert_eq!(
            poller.poll_once(),
            Ok(PollOutcome::Applied { records: 2, new_events: 1, alerts_sent: 1 })
        );

        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "New earthquake: TEST");
        assert!(sent[0].1.starts_with("ML: 4.1, Depth: 10 km"));
    }

    #[test]
    fn test_failed_fetch_leaves_state_untouched() {
        let base = vec![quake("10:00", "2.0")];
        let poller = poller_with(
            ScriptedFeed::new(vec![Ok(base.clone()), Err(FeedError::HttpError(500)), Ok(base)]),
            RecordingNotifier::default(),
        );

        poller.poll_once().expect("baseline poll");
        let before = poller.session().lock().unwrap().status().clone();

        assert_eq!(poller.poll_once(), Err(FeedError::HttpError(500)));
        let after = poller.session().lock().unwrap().status().clone();
        assert_eq!(before, after);
        assert_eq!(poller.session().lock().unwrap().snapshot().len(), 1);

        // Next tick retries unconditionally.
        assert!(matches!(poller.poll_once(), Ok(PollOutcome::Applied { .. })));
    }

    #[test]
    fn test_notifier_failure_does_not_abort_tick() {
        let notifier = RecordingNotifier { fail: true, ..Default::default() };
        let poller = poller_with(
            ScriptedFeed::new(vec![Ok(vec![]), Ok(vec![quake("10:00", "7.0"), quake("10:01", "6.5")])]),
            notifier,
        );

        poller.poll_once().expect("baseline poll");
        assert_eq!(
            poller.poll_once(),
            Ok(PollOutcome::Applied { records: 2, new_events: 2, alerts_sent: 0 })
        );
        assert_eq!(poller.session().lock().unwrap().status().new_count, 2);
    }

    #[test]
    fn test_threshold_change_applies_to_next_poll() {
        let notifier = RecordingNotifier::default();
        let poller = poller_with(
            ScriptedFeed::new(vec![Ok(vec![]), Ok(vec![quake("10:00", "5.0")])]),
            notifier.clone(),
        );
        poller.set_thresholds(Thresholds {
            min_magnitude: 7.0,
            notify_magnitude_threshold: 6.0,
            max_distance_km: 50.0,
        });

        poller.poll_once().expect("baseline poll");
        assert_eq!(
            poller.poll_once(),
            Ok(PollOutcome::Applied { records: 1, new_events: 1, alerts_sent: 0 })
        );
        assert!(notifier.sent.lock().unwrap().is_empty());
    }

    /// Blocks inside `fetch` until the test releases it.
    struct GatedFeed {
        entered: Mutex<mpsc::Sender<()>>,
        release: Mutex<mpsc::Receiver<()>>,
    }

    impl FeedSource for GatedFeed {
        fn fetch(&self) -> Result<Vec<EarthquakeRecord>, FeedError> {
            self.entered.lock().unwrap().send(()).unwrap();
            self.release.lock().unwrap().recv().unwrap();
            Ok(Vec::new())
        }

        fn describe(&self) -> String {
            "gated".to_string()
        }
    }

    #[test]
    fn test_overlapping_tick_is_skipped() {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let feed = GatedFeed {
            entered: Mutex::new(entered_tx),
            release: Mutex::new(release_rx),
        };
        let poller = Arc::new(poller_with(feed, RecordingNotifier::default()));

        let background = {
            let poller = Arc::clone(&poller);
            thread::spawn(move || poller.poll_once())
        };

        entered_rx.recv().unwrap();
        assert_eq!(poller.poll_once(), Ok(PollOutcome::Skipped));

        release_tx.send(()).unwrap();
        let first = background.join().unwrap();
        assert_eq!(first, Ok(PollOutcome::Baseline { records: 0 }));
    }

    #[test]
    fn test_run_exits_when_stop_is_set() {
        let poller = poller_with(ScriptedFeed::new(vec![Ok(vec![])]), RecordingNotifier::default());
        let stop = AtomicBool::new(true);
        poller.run(&stop);
        assert_eq!(poller.session().lock().unwrap().status().applied_seq, 0);
    }
}

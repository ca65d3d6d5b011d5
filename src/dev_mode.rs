/// Development mode: replay a captured feed snapshot
///
/// When the live feed is unreachable, or when you want to watch alerts fire
/// without waiting for a real earthquake, point `[dev] replay_file` at a
/// saved copy of the feed JSON. The newest `held_back` records (the feed is
/// newest first) are hidden from the first fetch and revealed a few at a
/// time on each later fetch, so the poller sees them as new events.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::ingest::feed::{parse_feed_response, FeedSource};
use crate::model::{EarthquakeRecord, FeedError};

pub struct ReplayFeedSource {
    path: PathBuf,
    records: Vec<EarthquakeRecord>,
    held_back: usize,
    reveal_per_poll: usize,
    fetches: AtomicUsize,
}

impl ReplayFeedSource {
    /// Loads the snapshot file once; later fetches never touch the disk.
    ///
    /// # Arguments
    /// * `held_back` - Newest records hidden from the first fetch
    /// * `reveal_per_poll` - Hidden records revealed per subsequent fetch
    pub fn from_file(path: &Path, held_back: usize, reveal_per_poll: usize) -> Result<Self, FeedError> {
        let body = std::fs::read_to_string(path)
            .map_err(|e| FeedError::Io(format!("{}: {}", path.display(), e)))?;
        let records = parse_feed_response(&body)?;
        Ok(Self::from_records(path, records, held_back, reveal_per_poll))
    }

    pub fn from_records(
        path: &Path,
        records: Vec<EarthquakeRecord>,
        held_back: usize,
        reveal_per_poll: usize,
    ) -> Self {
        let held_back = held_back.min(records.len());
        ReplayFeedSource {
            path: path.to_path_buf(),
            records,
            held_back,
            reveal_per_poll: reveal_per_poll.max(1),
            fetches: AtomicUsize::new(0),
        }
    }

    /// Records still hidden after `fetch_number` prior fetches.
    fn hidden_after(&self, fetch_number: usize) -> usize {
        self.held_back
            .saturating_sub(fetch_number.saturating_mul(self.reveal_per_poll))
    }

    pub fn remaining_hidden(&self) -> usize {
        self.hidden_after(self.fetches.load(Ordering::Acquire))
    }
}

impl FeedSource for ReplayFeedSource {
    fn fetch(&self) -> Result<Vec<EarthquakeRecord>, FeedError> {
        let fetch_number = self.fetches.fetch_add(1, Ordering::AcqRel);
        let hidden = self.hidden_after(fetch_number);
        Ok(self.records[hidden..].to_vec())
    }

    fn describe(&self) -> String {
        format!("replay:{}", self.path.display())
    }
}

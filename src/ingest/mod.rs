//! Feed ingestion: fetching snapshots and driving the polling loop.

pub mod collector;
pub mod feed;
pub mod poller;

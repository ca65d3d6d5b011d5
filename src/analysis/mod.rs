//! Feed analysis for the earthquake monitoring service.
//!
//! This module decides what is *new* in each poll and extracts the small
//! amount of derived state the status display needs.
//!
//! Submodules:
//! - `novelty`: the seen-set and new/seen classification.
//! - `recency`: parses event date/time fields and finds the newest event.

pub mod novelty;
pub mod recency;

//! Structured cycle summary reporting.
//!
//! Counters are accumulated per cycle and returned to the caller rather than
//! held in shared state; the JSON rendering is what operators archive per
//! run.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::config::CollectionMode;

/// Outcome counts and timings for one collection cycle.
#[derive(Debug, Clone, Serialize)]
pub struct CycleSummary {
    pub cycle_id: Uuid,
    pub mode: String,
    pub collector_version: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<i64>,
    pub servers_processed: usize,
    pub repos_processed: usize,
    pub items_created: usize,
    pub items_updated: usize,
    pub records_inserted: usize,
    pub records_updated: usize,
    pub records_skipped: usize,
    /// Windows abandoned after the retry; the checkpoint does not advance
    /// past the earliest of them
    pub unresolved_windows: usize,
}

impl CycleSummary {
    pub fn new(mode: CollectionMode, started_at: DateTime<Utc>) -> Self {
        CycleSummary {
            cycle_id: Uuid::new_v4(),
            mode: mode.to_string(),
            collector_version: env!("CARGO_PKG_VERSION").to_string(),
            started_at,
            finished_at: None,
            duration_seconds: None,
            servers_processed: 0,
            repos_processed: 0,
            items_created: 0,
            items_updated: 0,
            records_inserted: 0,
            records_updated: 0,
            records_skipped: 0,
            unresolved_windows: 0,
        }
    }

    /// Stamp the end of the cycle.
    pub fn finish(&mut self, finished_at: DateTime<Utc>) {
        self.finished_at = Some(finished_at);
        self.duration_seconds = Some((finished_at - self.started_at).num_seconds());
    }

    /// Pretty JSON rendering of the summary.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize cycle summary to JSON")
    }
}

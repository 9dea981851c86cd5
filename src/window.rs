//! Lookback-clamped fetch window planning.
//!
//! Turns "collect everything since the last run" into one or more bounded
//! query windows covering `[effective_start, now)`, where the effective start
//! never precedes the configured lookback ceiling. A collector that has never
//! run, or has been down longer than the ceiling, starts at the ceiling,
//! which bounds worst-case query volume after an outage.

use chrono::{DateTime, Duration, Utc};
use log::info;

use crate::config::CollectorSettings;
use crate::constants::QUERY_TIMESTAMP_FORMAT;

/// A half-open query window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl std::fmt::Display for FetchWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}, {})",
            self.start.format(QUERY_TIMESTAMP_FORMAT),
            self.end.format(QUERY_TIMESTAMP_FORMAT)
        )
    }
}

/// Plans query windows from a checkpoint, a lookback ceiling, and a chunk
/// size.
#[derive(Debug, Clone)]
pub struct WindowPlanner {
    lookback: Duration,
    chunk: Duration,
    slack: Duration,
}

impl WindowPlanner {
    pub fn new(lookback: Duration, chunk: Duration, slack: Duration) -> Self {
        WindowPlanner {
            lookback,
            chunk,
            slack,
        }
    }

    pub fn from_settings(settings: &CollectorSettings) -> Self {
        WindowPlanner::new(
            settings.lookback_ceiling(),
            settings.chunk(),
            settings.overlap_slack(),
        )
    }

    /// `max(last_synced, now - lookback)`, minus the overlap slack.
    ///
    /// The slack deliberately reaches slightly behind the checkpoint so
    /// records finishing right at the boundary are re-observed; idempotent
    /// reconciliation absorbs the overlap.
    pub fn effective_start(
        &self,
        last_synced: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> DateTime<Utc> {
        let floor = now - self.lookback;
        let start = match last_synced {
            Some(checkpoint) if checkpoint >= floor => checkpoint,
            Some(_) => {
                info!("Checkpoint is older than the lookback ceiling, clamping");
                floor
            }
            None => floor,
        };
        start - self.slack
    }

    /// A single window covering the whole interval.
    pub fn plan_single(&self, last_synced: Option<DateTime<Utc>>, now: DateTime<Utc>) -> FetchWindow {
        FetchWindow {
            start: self.effective_start(last_synced, now),
            end: now,
        }
    }

    /// The interval subdivided into chunk-sized windows, ascending, with the
    /// final chunk clipped to `now`.
    ///
    /// Consumers rely on the ascending order to process older data first so
    /// checkpoint bookkeeping advances monotonically under partial failure.
    pub fn plan_chunked(
        &self,
        last_synced: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Vec<FetchWindow> {
        let mut windows = Vec::new();
        let mut start = self.effective_start(last_synced, now);
        while start < now {
            let end = std::cmp::min(start + self.chunk, now);
            windows.push(FetchWindow { start, end });
            start = end;
        }
        windows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn planner_days(lookback: i64) -> WindowPlanner {
        WindowPlanner::new(
            Duration::days(lookback),
            Duration::days(1),
            Duration::zero(),
        )
    }

    #[test]
    fn test_fresh_checkpoint_is_not_clamped() {
        let now = Utc::now();
        let planner = planner_days(3);
        let checkpoint = now - Duration::days(1);

        let window = planner.plan_single(Some(checkpoint), now);
        assert_eq!(window.start, checkpoint);
        assert_eq!(window.end, now);
    }

    #[test]
    fn test_stale_checkpoint_clamps_to_ceiling() {
        let now = Utc::now();
        let planner = planner_days(3);
        let checkpoint = now - Duration::days(10);

        let window = planner.plan_single(Some(checkpoint), now);
        assert_eq!(window.start, now - Duration::days(3));
    }

    #[test]
    fn test_never_run_starts_at_ceiling() {
        let now = Utc::now();
        let planner = planner_days(3);

        let window = planner.plan_single(None, now);
        assert_eq!(window.start, now - Duration::days(3));
    }

    #[test]
    fn test_slack_reaches_behind_checkpoint() {
        let now = Utc::now();
        let planner = WindowPlanner::new(
            Duration::days(3),
            Duration::days(1),
            Duration::minutes(5),
        );
        let checkpoint = now - Duration::days(1);

        let window = planner.plan_single(Some(checkpoint), now);
        assert_eq!(window.start, checkpoint - Duration::minutes(5));
    }

    #[test]
    fn test_chunked_windows_cover_interval() {
        let now = Utc::now();
        let planner = planner_days(3);
        let checkpoint = now - Duration::days(2) - Duration::hours(5);

        let windows = planner.plan_chunked(Some(checkpoint), now);
        assert_eq!(windows.len(), 3);
        assert_eq!(windows[0].start, checkpoint);
        assert_eq!(windows[0].end, checkpoint + Duration::days(1));
        assert_eq!(windows[1].start, windows[0].end);
        // Final chunk clipped to now
        assert_eq!(windows[2].end, now);
    }

    #[test]
    fn test_chunked_exact_multiple_has_no_empty_tail() {
        let now = Utc::now();
        let planner = planner_days(3);
        let checkpoint = now - Duration::days(2);

        let windows = planner.plan_chunked(Some(checkpoint), now);
        assert_eq!(windows.len(), 2);
        assert_eq!(windows.last().unwrap().end, now);
    }

    #[test]
    fn test_future_checkpoint_yields_no_chunks() {
        let now = Utc::now();
        let planner = planner_days(3);
        let checkpoint = now + Duration::hours(1);

        let windows = planner.plan_chunked(Some(checkpoint), now);
        assert!(windows.is_empty());
    }

    proptest! {
        /// Lookback clamp: windows never start before `now - ceiling`.
        #[test]
        fn prop_lookback_clamp(age_hours in 0i64..2000, lookback_days in 1i64..30) {
            let now = Utc::now();
            let planner = WindowPlanner::new(
                Duration::days(lookback_days),
                Duration::hours(6),
                Duration::zero(),
            );
            let checkpoint = now - Duration::hours(age_hours);

            let start = planner.effective_start(Some(checkpoint), now);
            prop_assert!(start >= now - Duration::days(lookback_days));
        }

        /// Window coverage: the chunked plan covers [effective_start, now)
        /// exactly, ascending, with no gaps and no overlaps.
        #[test]
        fn prop_chunked_coverage(age_hours in 1i64..500, chunk_hours in 1i64..72) {
            let now = Utc::now();
            let planner = WindowPlanner::new(
                Duration::days(30),
                Duration::hours(chunk_hours),
                Duration::zero(),
            );
            let checkpoint = now - Duration::hours(age_hours);

            let windows = planner.plan_chunked(Some(checkpoint), now);
            prop_assert!(!windows.is_empty());
            prop_assert_eq!(windows[0].start, checkpoint);
            prop_assert_eq!(windows.last().unwrap().end, now);
            for pair in windows.windows(2) {
                prop_assert_eq!(pair[0].end, pair[1].start);
                prop_assert!(pair[0].start < pair[0].end);
            }
        }
    }
}

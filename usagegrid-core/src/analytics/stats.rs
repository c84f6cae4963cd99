//! Live statistics computed straight from transcripts
//!
//! [`LiveStats`] drives scanner, parser and aggregator for the three live
//! requests: today, the rolling window, and the gap days since the cache was
//! last computed. Each request scans only files modified since its own
//! earliest range start.
//!
//! [`MergedHistory`] combines the cached baseline with gap days. The merge is
//! recomputed from scratch on every reload and never writes back.

use super::aggregate::{day_range, gap_day_ranges, RangeAggregator, RollingWindowAggregator};
use crate::cache::CachedSummary;
use crate::ingest::{records_from, scan};
use crate::types::{DayActivity, DayBucket, GapDays, RollingWindowBucket};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// Computes live statistics over a transcript directory.
#[derive(Debug, Clone)]
pub struct LiveStats {
    projects_dir: PathBuf,
}

impl LiveStats {
    pub fn new(projects_dir: impl Into<PathBuf>) -> Self {
        Self {
            projects_dir: projects_dir.into(),
        }
    }

    pub fn projects_dir(&self) -> &Path {
        &self.projects_dir
    }

    /// Messages and sessions for the local day containing `now`.
    pub fn today<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> DayBucket {
        let range = day_range(&now.timezone(), now.date_naive());
        let files = scan(&self.projects_dir, range.start);

        let mut aggregator = RangeAggregator::new(vec![range]);
        aggregator.extend(records_from(&files));

        let bucket = aggregator
            .into_buckets()
            .pop()
            .map(|(_, bucket)| bucket)
            .unwrap_or_default();

        tracing::debug!(
            files = files.len(),
            messages = bucket.message_count,
            sessions = bucket.session_count(),
            "Computed today's stats"
        );
        bucket
    }

    /// Messages in the trailing `hours` before `now`.
    pub fn rolling_window(&self, now: DateTime<Utc>, hours: u32) -> RollingWindowBucket {
        let mut aggregator = RollingWindowAggregator::new(now, hours);
        let files = scan(&self.projects_dir, aggregator.start());
        aggregator.extend(records_from(&files));

        let bucket = aggregator.finish();
        tracing::debug!(
            files = files.len(),
            hours,
            messages = bucket.message_count,
            "Computed rolling window"
        );
        bucket
    }

    /// Per-day buckets for the days after `last_computed_date`, through
    /// yesterday.
    ///
    /// Every gap day is present in the result, with an empty bucket when no
    /// records fell on it. No cache date, or one that is not in the past,
    /// means no gap days and no scan.
    pub fn recent_days<Tz: TimeZone>(
        &self,
        last_computed_date: Option<&str>,
        now: &DateTime<Tz>,
    ) -> GapDays {
        let aggregator = RangeAggregator::new(gap_day_ranges(last_computed_date, now));
        let Some(lower_bound) = aggregator.earliest_start() else {
            return GapDays::new();
        };

        let files = scan(&self.projects_dir, lower_bound);
        let mut aggregator = aggregator;
        aggregator.extend(records_from(&files));
        let days = aggregator.into_map();

        tracing::debug!(
            files = files.len(),
            days = days.len(),
            since = last_computed_date.unwrap_or(""),
            "Computed gap days"
        );
        days
    }
}

/// Lifetime totals shown in the header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UsageTotals {
    pub total_messages: u64,
    pub total_sessions: u64,
}

/// Cached baseline merged with freshly computed gap days.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedHistory {
    pub daily: BTreeMap<NaiveDate, DayActivity>,
    pub totals: UsageTotals,
}

impl MergedHistory {
    /// Merge `summary` with `gap`.
    ///
    /// Per day, the source with the larger message count wins. Totals add only
    /// what the gap days found beyond the baseline for the same dates, and gap
    /// sessions are counted once across all gap days.
    pub fn compute(summary: &CachedSummary, gap: &GapDays) -> Self {
        let baseline = summary.baseline_by_date();
        let daily = merge_daily(&baseline, gap);

        let extra_messages: u64 = gap
            .iter()
            .map(|(date, bucket)| {
                let cached = baseline.get(date).map_or(0, |a| a.message_count);
                bucket.message_count.saturating_sub(cached)
            })
            .sum();

        let gap_sessions: BTreeSet<&str> = gap
            .values()
            .flat_map(|b| b.session_ids.iter().map(String::as_str))
            .collect();
        let cached_gap_sessions: u64 = gap
            .keys()
            .filter_map(|date| baseline.get(date))
            .map(|a| a.session_count)
            .sum();
        let extra_sessions = (gap_sessions.len() as u64).saturating_sub(cached_gap_sessions);

        Self {
            daily,
            totals: UsageTotals {
                total_messages: summary.total_messages() + extra_messages,
                total_sessions: summary.total_sessions() + extra_sessions,
            },
        }
    }
}

/// Merge baseline and gap activity; the larger message count wins per date.
pub fn merge_daily(
    baseline: &BTreeMap<NaiveDate, DayActivity>,
    gap: &GapDays,
) -> BTreeMap<NaiveDate, DayActivity> {
    let mut merged = baseline.clone();
    for (date, bucket) in gap {
        let fresh = DayActivity::from(bucket);
        merged
            .entry(*date)
            .and_modify(|existing| {
                if fresh.message_count > existing.message_count {
                    *existing = fresh;
                }
            })
            .or_insert(fresh);
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ActivityRecord, RecordKind};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn bucket(messages: u64, sessions: &[&str]) -> DayBucket {
        let mut b = DayBucket::default();
        for i in 0..messages {
            b.record(&ActivityRecord {
                timestamp: Utc::now(),
                kind: RecordKind::User,
                session_id: sessions
                    .get(i as usize % sessions.len().max(1))
                    .map(|s| s.to_string()),
            });
        }
        b
    }

    fn summary(json: &str) -> CachedSummary {
        CachedSummary::from_slice(json.as_bytes()).unwrap()
    }

    #[test]
    fn test_merge_higher_message_count_wins() {
        let mut baseline = BTreeMap::new();
        baseline.insert(
            date(2024, 6, 5),
            DayActivity {
                message_count: 10,
                session_count: 1,
                tool_call_count: 4,
            },
        );
        baseline.insert(
            date(2024, 6, 4),
            DayActivity {
                message_count: 50,
                session_count: 2,
                tool_call_count: 0,
            },
        );
        let mut gap = GapDays::new();
        gap.insert(date(2024, 6, 5), bucket(25, &["a", "b"]));
        gap.insert(date(2024, 6, 4), bucket(3, &["c"]));

        let merged = merge_daily(&baseline, &gap);
        assert_eq!(merged[&date(2024, 6, 5)].message_count, 25);
        assert_eq!(merged[&date(2024, 6, 5)].session_count, 2);
        assert_eq!(merged[&date(2024, 6, 4)].message_count, 50);
    }

    #[test]
    fn test_merge_adds_new_gap_days() {
        let mut gap = GapDays::new();
        gap.insert(date(2024, 6, 7), bucket(4, &["x"]));
        let merged = merge_daily(&BTreeMap::new(), &gap);
        assert_eq!(merged[&date(2024, 6, 7)].message_count, 4);
        assert_eq!(merged[&date(2024, 6, 7)].tool_call_count, 0);
    }

    #[test]
    fn test_totals_add_gap_days() {
        let cached = summary(
            r#"{"version":1,"lastComputedDate":"2024-06-05",
                "dailyActivity":[{"date":"2024-06-05","messageCount":10,"sessionCount":1,"toolCallCount":0}],
                "totalMessages":100,"totalSessions":7}"#,
        );
        let mut gap = GapDays::new();
        gap.insert(date(2024, 6, 6), bucket(12, &["s1", "s2"]));
        gap.insert(date(2024, 6, 7), bucket(8, &["s2", "s3"]));

        let history = MergedHistory::compute(&cached, &gap);
        assert_eq!(history.totals.total_messages, 120);
        // s2 spans both days but is counted once
        assert_eq!(history.totals.total_sessions, 10);
        assert_eq!(history.daily.len(), 3);
    }

    #[test]
    fn test_totals_do_not_double_count_overlap() {
        let cached = summary(
            r#"{"version":1,"lastComputedDate":"2024-06-04",
                "dailyActivity":[{"date":"2024-06-05","messageCount":10,"sessionCount":1,"toolCallCount":0}],
                "totalMessages":10,"totalSessions":1}"#,
        );
        let mut gap = GapDays::new();
        gap.insert(date(2024, 6, 5), bucket(25, &["a", "b"]));

        let history = MergedHistory::compute(&cached, &gap);
        assert_eq!(history.daily[&date(2024, 6, 5)].message_count, 25);
        assert_eq!(history.totals.total_messages, 25);
        assert_eq!(history.totals.total_sessions, 2);
    }

    #[test]
    fn test_empty_inputs() {
        let history = MergedHistory::compute(&CachedSummary::default(), &GapDays::new());
        assert_eq!(history, MergedHistory::default());
    }
}

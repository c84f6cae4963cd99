//! Time-range bucketing of activity records
//!
//! Every range is half-open, `[start, end)`: a record stamped exactly at
//! `end` belongs to the following range. Timestamps are compared as UTC
//! instants.
//!
//! When several ranges share one pass over the records, each record is tested
//! against the ranges in order and lands in the first match only, so day
//! ranges partition time without double counting.

use crate::cache::CACHE_DATE_FORMAT;
use crate::types::{ActivityRecord, DayBucket, RollingWindowBucket};
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use std::collections::BTreeMap;

/// A keyed, half-open `[start, end)` interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeRange<K> {
    pub key: K,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl<K> TimeRange<K> {
    pub fn new(key: K, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { key, start, end }
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts < self.end
    }
}

/// Accumulates records into one bucket per range, first match wins.
#[derive(Debug, Clone)]
pub struct RangeAggregator<K> {
    ranges: Vec<TimeRange<K>>,
    buckets: Vec<DayBucket>,
}

impl<K> RangeAggregator<K> {
    pub fn new(ranges: Vec<TimeRange<K>>) -> Self {
        let buckets = vec![DayBucket::default(); ranges.len()];
        Self { ranges, buckets }
    }

    /// Earliest start across all ranges, used as the scan lower bound.
    pub fn earliest_start(&self) -> Option<DateTime<Utc>> {
        self.ranges.iter().map(|r| r.start).min()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Count `record` in the first range containing it.
    ///
    /// Returns whether the record matched any range.
    pub fn observe(&mut self, record: &ActivityRecord) -> bool {
        match self
            .ranges
            .iter()
            .position(|r| r.contains(record.timestamp))
        {
            Some(idx) => {
                self.buckets[idx].record(record);
                true
            }
            None => false,
        }
    }

    /// Ranges paired with their buckets, in range order.
    pub fn into_buckets(self) -> Vec<(TimeRange<K>, DayBucket)> {
        self.ranges.into_iter().zip(self.buckets).collect()
    }
}

impl<K: Ord> RangeAggregator<K> {
    /// Buckets keyed by range key. Ranges sharing a key are merged.
    pub fn into_map(self) -> BTreeMap<K, DayBucket> {
        let mut map: BTreeMap<K, DayBucket> = BTreeMap::new();
        for (range, bucket) in self.ranges.into_iter().zip(self.buckets) {
            map.entry(range.key).or_default().merge(&bucket);
        }
        map
    }
}

impl<K> Extend<ActivityRecord> for RangeAggregator<K> {
    fn extend<I: IntoIterator<Item = ActivityRecord>>(&mut self, iter: I) {
        for record in iter {
            self.observe(&record);
        }
    }
}

/// Accumulates records falling inside a single trailing window.
#[derive(Debug, Clone)]
pub struct RollingWindowAggregator {
    range: TimeRange<()>,
    bucket: RollingWindowBucket,
}

impl RollingWindowAggregator {
    /// Window of `hours` ending at `now` (exclusive).
    pub fn new(now: DateTime<Utc>, hours: u32) -> Self {
        let start = now - Duration::hours(i64::from(hours));
        Self {
            range: TimeRange::new((), start, now),
            bucket: RollingWindowBucket::default(),
        }
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.range.start
    }

    pub fn observe(&mut self, record: &ActivityRecord) -> bool {
        if self.range.contains(record.timestamp) {
            self.bucket.record(record);
            true
        } else {
            false
        }
    }

    pub fn finish(self) -> RollingWindowBucket {
        self.bucket
    }
}

impl Extend<ActivityRecord> for RollingWindowAggregator {
    fn extend<I: IntoIterator<Item = ActivityRecord>>(&mut self, iter: I) {
        for record in iter {
            self.observe(&record);
        }
    }
}

/// Bucket `records` into `ranges` in one pass.
pub fn aggregate<K, I>(ranges: Vec<TimeRange<K>>, records: I) -> Vec<(TimeRange<K>, DayBucket)>
where
    I: IntoIterator<Item = ActivityRecord>,
{
    let mut aggregator = RangeAggregator::new(ranges);
    aggregator.extend(records);
    aggregator.into_buckets()
}

/// The UTC instant of local midnight at the start of `date` in `tz`.
///
/// If midnight does not exist locally (a DST jump at 00:00), the first valid
/// local time after it is used.
pub fn start_of_day<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> DateTime<Utc> {
    let midnight = date.and_time(NaiveTime::MIN);
    (0..=3)
        .find_map(|h| {
            tz.from_local_datetime(&(midnight + Duration::hours(h)))
                .earliest()
        })
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&midnight))
}

/// Range covering the local calendar day `date`.
pub fn day_range<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> TimeRange<NaiveDate> {
    let next = date.succ_opt().unwrap_or(date);
    TimeRange::new(date, start_of_day(tz, date), start_of_day(tz, next))
}

/// Ranges for the days the cache does not cover yet.
///
/// One range per whole local day strictly after `last_computed_date` up to
/// and including yesterday; today is computed live elsewhere. An absent,
/// unparseable or non-past cache date yields no ranges.
pub fn gap_day_ranges<Tz: TimeZone>(
    last_computed_date: Option<&str>,
    now: &DateTime<Tz>,
) -> Vec<TimeRange<NaiveDate>> {
    let Some(last) = last_computed_date
        .and_then(|s| NaiveDate::parse_from_str(s.trim(), CACHE_DATE_FORMAT).ok())
    else {
        return vec![];
    };

    let tz = now.timezone();
    let today = now.date_naive();

    last.iter_days()
        .skip(1)
        .take_while(|day| *day < today)
        .map(|day| day_range(&tz, day))
        .collect()
}

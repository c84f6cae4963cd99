//! Core domain types for usagegrid
//!
//! These types are value data owned by the aggregation pass that produced
//! them. Nothing here is shared or mutated across passes.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Transcript** | Append-only JSONL log of one Claude Code session |
//! | **Record** | One countable line of a transcript (a user or assistant message) |
//! | **Baseline** | Daily activity previously persisted in the stats cache |
//! | **Gap day** | A day after the baseline's last computed date, not yet in the cache |
//! | **Rolling window** | A trailing fixed-duration interval ending at "now" |

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

// ============================================
// Records
// ============================================

/// Kind of transcript line that counts as a message.
///
/// Other line types (`system`, `summary`, `file-history-snapshot`, ...) are
/// dropped by the parser and never become records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    User,
    Assistant,
}

impl RecordKind {
    /// Map a transcript `type` field to a countable kind.
    pub fn from_type(value: &str) -> Option<Self> {
        match value {
            "user" => Some(RecordKind::User),
            "assistant" => Some(RecordKind::Assistant),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::User => "user",
            RecordKind::Assistant => "assistant",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One parsed transcript line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityRecord {
    /// When the message was emitted, normalized to UTC at parse time
    pub timestamp: DateTime<Utc>,
    /// User or assistant
    pub kind: RecordKind,
    /// Owning session, when the line carries one
    pub session_id: Option<String>,
}

// ============================================
// Buckets
// ============================================

/// Message count and distinct sessions for one time range.
///
/// `session_count` is always derived from the id set, so merging buckets that
/// saw the same session never counts it twice.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DayBucket {
    pub message_count: u64,
    pub session_ids: BTreeSet<String>,
}

impl DayBucket {
    /// Count one record.
    pub fn record(&mut self, record: &ActivityRecord) {
        self.message_count += 1;
        if let Some(sid) = &record.session_id {
            // BTreeSet::insert is a no-op for ids already present
            self.session_ids.insert(sid.clone());
        }
    }

    /// Fold another bucket into this one.
    pub fn merge(&mut self, other: &DayBucket) {
        self.message_count += other.message_count;
        self.session_ids.extend(other.session_ids.iter().cloned());
    }

    pub fn session_count(&self) -> u64 {
        self.session_ids.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.message_count == 0
    }
}

/// Bucket over the trailing `[now - H hours, now)` window.
///
/// Also keeps the earliest and latest matched timestamps; the earliest one
/// determines when the window starts freeing up again.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RollingWindowBucket {
    pub message_count: u64,
    pub session_ids: BTreeSet<String>,
    pub earliest: Option<DateTime<Utc>>,
    pub latest: Option<DateTime<Utc>>,
}

impl RollingWindowBucket {
    /// Count one record and widen the observed timestamp span.
    pub fn record(&mut self, record: &ActivityRecord) {
        self.message_count += 1;
        if let Some(sid) = &record.session_id {
            self.session_ids.insert(sid.clone());
        }
        let ts = record.timestamp;
        self.earliest = Some(self.earliest.map_or(ts, |e| e.min(ts)));
        self.latest = Some(self.latest.map_or(ts, |l| l.max(ts)));
    }

    pub fn session_count(&self) -> u64 {
        self.session_ids.len() as u64
    }

    /// When the oldest message in the window ages out.
    pub fn estimated_reset(&self, window_hours: u32) -> Option<DateTime<Utc>> {
        self.earliest
            .map(|e| e + Duration::hours(i64::from(window_hours)))
    }

    /// Share of `limit` consumed, clamped to `0.0..=1.0`.
    pub fn usage_fraction(&self, limit: u64) -> f64 {
        if limit == 0 {
            return 0.0;
        }
        (self.message_count as f64 / limit as f64).min(1.0)
    }
}

// ============================================
// Daily activity
// ============================================

/// Counts for one calendar day, whichever source produced them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DayActivity {
    pub message_count: u64,
    pub session_count: u64,
    pub tool_call_count: u64,
}

impl From<&DayBucket> for DayActivity {
    fn from(bucket: &DayBucket) -> Self {
        Self {
            message_count: bucket.message_count,
            session_count: bucket.session_count(),
            tool_call_count: 0,
        }
    }
}

/// A freshly computed gap day, keyed by its local calendar date.
pub type GapDays = std::collections::BTreeMap<NaiveDate, DayBucket>;

// ============================================
// Intensity
// ============================================

/// Five-band classification of a day's message count.
///
/// The band boundaries are fixed; every consumer must classify identically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Intensity {
    Empty,
    Low,
    Medium,
    High,
    VeryHigh,
}

impl Intensity {
    pub fn from_message_count(count: u64) -> Self {
        match count {
            0 => Intensity::Empty,
            1..=50 => Intensity::Low,
            51..=300 => Intensity::Medium,
            301..=1000 => Intensity::High,
            _ => Intensity::VeryHigh,
        }
    }

    /// Numeric level, 0 (none) through 4 (very high).
    pub fn level(&self) -> u8 {
        *self as u8
    }
}

//! Reader for Claude Code's persisted stats cache
//!
//! Claude Code periodically writes `~/.claude/stats-cache.json` with a
//! per-day activity summary. usagegrid treats it as a read-only baseline:
//! it is never written here, only merged with freshly computed gap days at
//! read time.

use crate::error::Result;
use crate::types::DayActivity;
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Date format used by the cache for `date` and `lastComputedDate`.
pub const CACHE_DATE_FORMAT: &str = "%Y-%m-%d";

/// The persisted summary document.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CachedSummary {
    #[serde(default)]
    pub version: u32,
    /// Last day fully reflected in `daily_activity`
    #[serde(default)]
    pub last_computed_date: Option<String>,
    #[serde(default)]
    pub daily_activity: Vec<DailyActivity>,
    #[serde(default)]
    pub total_messages: Option<u64>,
    #[serde(default)]
    pub total_sessions: Option<u64>,
    #[serde(default)]
    pub first_session_date: Option<String>,
}

/// One day of cached activity.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DailyActivity {
    pub date: String,
    #[serde(default)]
    pub message_count: u64,
    #[serde(default)]
    pub session_count: u64,
    #[serde(default)]
    pub tool_call_count: u64,
}

impl CachedSummary {
    /// Parse a summary from raw JSON bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Daily activity keyed by date.
    ///
    /// Entries with unparseable dates are dropped. If a date appears more
    /// than once the larger message count wins.
    pub fn baseline_by_date(&self) -> BTreeMap<NaiveDate, DayActivity> {
        let mut by_date = BTreeMap::new();
        for entry in &self.daily_activity {
            let Ok(date) = NaiveDate::parse_from_str(&entry.date, CACHE_DATE_FORMAT) else {
                tracing::debug!(date = %entry.date, "Skipping cached day with bad date");
                continue;
            };
            let activity = DayActivity {
                message_count: entry.message_count,
                session_count: entry.session_count,
                tool_call_count: entry.tool_call_count,
            };
            by_date
                .entry(date)
                .and_modify(|existing: &mut DayActivity| {
                    if activity.message_count > existing.message_count {
                        *existing = activity;
                    }
                })
                .or_insert(activity);
        }
        by_date
    }

    /// `lastComputedDate` as a calendar date, if present and well-formed.
    pub fn last_computed(&self) -> Option<NaiveDate> {
        self.last_computed_date
            .as_deref()
            .and_then(|s| NaiveDate::parse_from_str(s, CACHE_DATE_FORMAT).ok())
    }

    pub fn total_messages(&self) -> u64 {
        self.total_messages.unwrap_or(0)
    }

    pub fn total_sessions(&self) -> u64 {
        self.total_sessions.unwrap_or(0)
    }
}

/// Read the cache document at `path`.
///
/// Returns `Ok(None)` when the file does not exist or cannot be read, and
/// `Err` only when the file was read but is not a valid summary (typically a
/// write caught halfway through).
pub fn read_cache(path: &Path) -> Result<Option<CachedSummary>> {
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "Stats cache unavailable");
            return Ok(None);
        }
    };

    CachedSummary::from_slice(&bytes).map(Some)
}

/// Read the cache document, degrading any failure to an empty summary.
pub fn load_or_default(path: &Path) -> CachedSummary {
    match read_cache(path) {
        Ok(Some(summary)) => summary,
        Ok(None) => CachedSummary::default(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to decode stats cache");
            CachedSummary::default()
        }
    }
}

//! Line-by-line transcript parser
//!
//! Each line of a Claude Code transcript is an independent JSON object.
//! Only `user` and `assistant` lines with a valid timestamp become
//! [`ActivityRecord`]s; every other line is skipped on its own.
//!
//! # Error Handling
//!
//! - **Malformed JSON / non-object lines**: skipped, parsing continues.
//! - **Missing or unparseable `timestamp`**: skipped.
//! - **Other record types** (`system`, `summary`, ...): skipped.
//! - **Non-string `sessionId`**: the record is kept with no session.
//! - **File cannot be opened**: the iterator is empty.
//! - **Read error mid-file** (truncation, permissions): the iterator ends
//!   after the last good line.
//!
//! Timestamps are normalized to UTC instants here, so downstream range
//! checks compare instants rather than strings.

use crate::types::{ActivityRecord, RecordKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use std::fs::File;
use std::io::{BufRead, BufReader, Split};
use std::path::{Path, PathBuf};

/// The subset of a transcript line we care about. Unknown fields are ignored.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct RawRecord {
    #[serde(rename = "type", deserialize_with = "lenient_string")]
    record_type: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    timestamp: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    session_id: Option<String>,
}

/// Accept any JSON value, keeping it only when it is a string.
fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Some(s),
        _ => None,
    })
}

/// Parse an RFC 3339 timestamp, with or without fractional seconds and with
/// any offset, into a UTC instant.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Parse one transcript line.
///
/// Returns `None` for anything that is not a countable message.
pub fn parse_line(line: &[u8]) -> Option<ActivityRecord> {
    let raw: RawRecord = serde_json::from_slice(line).ok()?;
    let kind = RecordKind::from_type(raw.record_type.as_deref()?)?;
    let timestamp = parse_timestamp(raw.timestamp.as_deref()?)?;

    Some(ActivityRecord {
        timestamp,
        kind,
        session_id: raw.session_id,
    })
}

/// Lazy iterator over the countable records of one transcript file.
///
/// Re-opening the same path yields the same sequence for unchanged content.
pub struct TranscriptRecords {
    path: PathBuf,
    lines: Option<Split<BufReader<File>>>,
    line_number: usize,
    skipped: usize,
}

impl TranscriptRecords {
    /// Number of non-blank lines skipped so far.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    fn finish(&mut self) {
        if self.lines.take().is_some() && self.skipped > 0 {
            tracing::trace!(
                path = %self.path.display(),
                lines = self.line_number,
                skipped = self.skipped,
                "Skipped non-message lines"
            );
        }
    }
}

impl Iterator for TranscriptRecords {
    type Item = ActivityRecord;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let next = self.lines.as_mut()?.next();
            match next {
                None => {
                    self.finish();
                    return None;
                }
                Some(Err(e)) => {
                    tracing::debug!(
                        path = %self.path.display(),
                        line = self.line_number + 1,
                        error = %e,
                        "Transcript read failed, stopping early"
                    );
                    self.finish();
                    return None;
                }
                Some(Ok(line)) => {
                    self.line_number += 1;
                    if line.iter().all(u8::is_ascii_whitespace) {
                        continue;
                    }
                    match parse_line(&line) {
                        Some(record) => return Some(record),
                        None => self.skipped += 1,
                    }
                }
            }
        }
    }
}

/// Stream the records of the transcript at `path`.
///
/// A file that cannot be opened produces an empty iterator.
pub fn parse_lines(path: &Path) -> TranscriptRecords {
    let lines = match File::open(path) {
        Ok(file) => Some(BufReader::new(file).split(b'\n')),
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "Cannot open transcript");
            None
        }
    };

    TranscriptRecords {
        path: path.to_path_buf(),
        lines,
        line_number: 0,
        skipped: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_parse_user_line() {
        let line = br#"{"type":"user","timestamp":"2024-06-01T10:00:00.123Z","sessionId":"s1","message":{"role":"user"}}"#;
        let record = parse_line(line).unwrap();
        assert_eq!(record.kind, RecordKind::User);
        assert_eq!(record.session_id.as_deref(), Some("s1"));
        assert_eq!(
            record.timestamp,
            Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap() + chrono::Duration::milliseconds(123)
        );
    }

    #[test]
    fn test_parse_assistant_line_without_session() {
        let line = br#"{"type":"assistant","timestamp":"2024-06-01T10:00:00Z"}"#;
        let record = parse_line(line).unwrap();
        assert_eq!(record.kind, RecordKind::Assistant);
        assert!(record.session_id.is_none());
    }

    #[test]
    fn test_parse_normalizes_offsets() {
        let with_offset = parse_line(br#"{"type":"user","timestamp":"2024-06-01T12:00:00+02:00"}"#)
            .unwrap();
        let utc = parse_line(br#"{"type":"user","timestamp":"2024-06-01T10:00:00.000Z"}"#).unwrap();
        assert_eq!(with_offset.timestamp, utc.timestamp);
    }

    #[test]
    fn test_parse_skips_uncountable_lines() {
        assert!(parse_line(b"not json").is_none());
        assert!(parse_line(b"[1,2,3]").is_none());
        assert!(parse_line(br#"{"type":"system","timestamp":"2024-06-01T10:00:00Z"}"#).is_none());
        assert!(parse_line(br#"{"type":"user"}"#).is_none());
        assert!(parse_line(br#"{"type":"user","timestamp":"yesterday"}"#).is_none());
        assert!(parse_line(br#"{"type":"user","timestamp":1717236000}"#).is_none());
        assert!(parse_line(br#"{"timestamp":"2024-06-01T10:00:00Z"}"#).is_none());
        assert!(parse_line(br#"{"type":"user","timestamp":"2024-06-01T10:"#).is_none());
    }

    #[test]
    fn test_parse_non_string_session_is_absent() {
        let record =
            parse_line(br#"{"type":"user","timestamp":"2024-06-01T10:00:00Z","sessionId":42}"#)
                .unwrap();
        assert!(record.session_id.is_none());
    }

    #[test]
    fn test_parse_lines_skips_bad_lines_and_continues() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("t.jsonl");
        let mut file = File::create(&path).unwrap();
        writeln!(file, r#"{{"type":"user","timestamp":"2024-06-01T00:00:00Z"}}"#).unwrap();
        writeln!(file, "not json").unwrap();
        writeln!(file).unwrap();
        file.write_all(&[0xff, 0xfe, b'\n']).unwrap();
        writeln!(file, r#"{{"type":"system","timestamp":"2024-06-01T01:00:00Z"}}"#).unwrap();
        write!(file, r#"{{"type":"assistant","timestamp":"2024-06-01T02:00:00Z"}}"#).unwrap();
        drop(file);

        let mut records = parse_lines(&path);
        let kinds: Vec<_> = records.by_ref().map(|r| r.kind).collect();
        assert_eq!(kinds, vec![RecordKind::User, RecordKind::Assistant]);
        assert_eq!(records.skipped(), 3);
    }

    #[test]
    fn test_parse_lines_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        assert_eq!(parse_lines(&dir.path().join("gone.jsonl")).count(), 0);
    }

    #[test]
    fn test_parse_lines_is_restartable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("t.jsonl");
        std::fs::write(
            &path,
            "{\"type\":\"user\",\"timestamp\":\"2024-06-01T00:00:00Z\",\"sessionId\":\"a\"}\n\
             {\"type\":\"assistant\",\"timestamp\":\"2024-06-01T00:00:01Z\",\"sessionId\":\"a\"}\n",
        )
        .unwrap();

        let first: Vec<_> = parse_lines(&path).collect();
        let second: Vec<_> = parse_lines(&path).collect();
        assert_eq!(first.len(), 2);
        assert_eq!(first, second);
    }
}

//! Ingestion layer for Claude Code transcripts
//!
//! Turns raw transcript files (Layer 0) into a stream of
//! [`ActivityRecord`]s for the aggregator.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────────┐     ┌─────────────────┐
//! │  Transcripts    │ ──► │     scanner      │ ──► │     parser      │ ──► records
//! │ (~/.claude/...) │     │ (mtime-bounded)  │     │ (line by line)  │
//! └─────────────────┘     └──────────────────┘     └─────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use usagegrid_core::ingest;
//! use chrono::{Duration, Utc};
//! use std::path::Path;
//!
//! let files = ingest::scan(Path::new("/home/me/.claude/projects"), Utc::now() - Duration::hours(5));
//! let messages = ingest::records_from(&files).count();
//! println!("{} messages across {} files", messages, files.len());
//! ```

mod parser;
mod scanner;

pub use parser::{parse_line, parse_lines, parse_timestamp, TranscriptRecords};
pub use scanner::{mtime_buffer, scan, TRANSCRIPT_EXTENSION};

use crate::types::ActivityRecord;
use std::path::PathBuf;

/// Chain the records of several transcripts, file by file in the given order.
pub fn records_from(files: &[PathBuf]) -> impl Iterator<Item = ActivityRecord> + '_ {
    files.iter().flat_map(|path| parse_lines(path))
}

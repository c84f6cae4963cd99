//! Transcript discovery
//!
//! Transcripts are append-only and accumulate indefinitely, so every scan is
//! bounded by a modification-time lower bound: only files written since the
//! earliest instant the caller cares about are returned.

use chrono::{DateTime, Duration, Utc};
use glob::MatchOptions;
use std::path::{Component, Path, PathBuf};

/// File extension that marks a transcript.
pub const TRANSCRIPT_EXTENSION: &str = "jsonl";

/// Slack subtracted from the caller's lower bound before comparing mtimes.
///
/// Tolerates coarse mtime granularity and clock skew, and keeps files whose
/// last write straddles the boundary.
pub fn mtime_buffer() -> Duration {
    Duration::hours(1)
}

/// Find transcripts under `root` modified at or after `modified_after`
/// (minus [`mtime_buffer`]).
///
/// Walks recursively, skipping hidden files and directories. A missing or
/// unreadable root yields an empty list. Results are sorted by path.
pub fn scan(root: &Path, modified_after: DateTime<Utc>) -> Vec<PathBuf> {
    let cutoff = modified_after - mtime_buffer();

    let pattern = format!(
        "{}/**/*.{}",
        glob::Pattern::escape(&root.to_string_lossy()),
        TRANSCRIPT_EXTENSION
    );
    let options = MatchOptions {
        case_sensitive: true,
        require_literal_separator: true,
        require_literal_leading_dot: true,
    };

    let entries = match glob::glob_with(&pattern, options) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(root = %root.display(), error = %e, "Invalid transcript pattern");
            return vec![];
        }
    };

    let mut files: Vec<PathBuf> = entries
        .flatten()
        .filter(|path| !is_hidden_below(root, path))
        .filter(|path| modified_since(path, cutoff))
        .collect();

    files.sort();

    tracing::debug!(
        root = %root.display(),
        cutoff = %cutoff,
        count = files.len(),
        "Scanned for transcripts"
    );

    files
}

/// True when any component of `path` below `root` is a dotfile.
fn is_hidden_below(root: &Path, path: &Path) -> bool {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative.components().any(|c| match c {
        Component::Normal(name) => name.to_string_lossy().starts_with('.'),
        _ => false,
    })
}

fn modified_since(path: &Path, cutoff: DateTime<Utc>) -> bool {
    let Ok(metadata) = std::fs::metadata(path) else {
        return false;
    };
    if !metadata.is_file() {
        return false;
    }
    match metadata.modified() {
        Ok(modified) => DateTime::<Utc>::from(modified) >= cutoff,
        Err(_) => false,
    }
}

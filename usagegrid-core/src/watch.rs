//! Watches the stats cache document for changes
//!
//! The cache is usually rewritten by replace-by-rename, which swaps the inode
//! out from under a file watch. Watching the parent directory and filtering
//! on the file name keeps working across replacements.

use crate::error::{Error, Result};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use notify_debouncer_mini::{new_debouncer, DebouncedEvent, Debouncer};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Fires a callback whenever the cache document is written, replaced or
/// removed. Dropping the watcher stops it.
pub struct CacheWatcher {
    path: PathBuf,
    _debouncer: Debouncer<RecommendedWatcher>,
}

impl CacheWatcher {
    /// Start watching `cache_path`; `on_change` runs on the watcher thread.
    ///
    /// The parent directory must exist.
    pub fn start<F>(cache_path: &Path, debounce: Duration, on_change: F) -> Result<Self>
    where
        F: Fn() + Send + 'static,
    {
        let dir = cache_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or_else(|| {
                Error::Config(format!("cache path has no parent: {}", cache_path.display()))
            })?
            .to_path_buf();
        let file_name: OsString = cache_path
            .file_name()
            .ok_or_else(|| {
                Error::Config(format!("cache path has no file name: {}", cache_path.display()))
            })?
            .to_os_string();

        let mut debouncer = new_debouncer(
            debounce,
            move |events: std::result::Result<Vec<DebouncedEvent>, notify::Error>| match events {
                Ok(events) => {
                    if events
                        .iter()
                        .any(|e| e.path.file_name() == Some(file_name.as_os_str()))
                    {
                        tracing::debug!("Stats cache changed");
                        on_change();
                    }
                }
                Err(e) => tracing::warn!(error = %e, "Cache watcher error"),
            },
        )?;

        debouncer
            .watcher()
            .watch(&dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = %cache_path.display(), "Watching stats cache");

        Ok(Self {
            path: cache_path.to_path_buf(),
            _debouncer: debouncer,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

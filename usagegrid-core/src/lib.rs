//! # usagegrid-core
//!
//! Core library for usagegrid - a Claude Code usage tracker.
//!
//! This library provides:
//! - Reading the precomputed stats cache (`~/.claude/stats-cache.json`)
//! - Scanning and parsing session transcripts (`~/.claude/projects/**/*.jsonl`)
//! - Range aggregation for today, recent gap days and the rolling window
//! - The weekday calendar grid view model
//! - A refresh controller with a single worker thread
//! - The server-side usage quota (5-hour and 7-day windows)
//! - Configuration management and logging infrastructure
//!
//! ## Architecture
//!
//! Data flows through three layers:
//! - **Layer 0 (Raw):** the cache document and transcripts on disk, read only
//! - **Layer 1 (Records):** parsed [`ActivityRecord`]s with UTC timestamps
//! - **Layer 2 (Derived):** buckets, merged history and the grid, recomputed
//!   on every refresh
//!
//! ## Example
//!
//! ```rust,no_run
//! use usagegrid_core::{Config, Pipeline, PipelineSettings, RefreshKind};
//!
//! let config = Config::load().expect("failed to load config");
//! let mut pipeline = Pipeline::new(PipelineSettings::from(&config));
//! let snapshot = pipeline.refresh(RefreshKind::Full);
//! println!("{} messages today", snapshot.today_messages);
//! ```

// Re-export commonly used items at the crate root
pub use cache::CachedSummary;
pub use config::Config;
pub use controller::{Pipeline, PipelineSettings, RefreshKind, UsageController, UsageSnapshot};
pub use error::{Error, Result};
pub use types::*;
pub use watch::CacheWatcher;

// Public modules
pub mod analytics;
pub mod cache;
pub mod config;
pub mod controller;
pub mod error;
pub mod format;
pub mod ingest;
pub mod logging;
pub mod quota;
pub mod types;
pub mod watch;

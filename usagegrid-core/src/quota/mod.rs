//! Server-side usage quota
//!
//! Claude's OAuth usage endpoint reports utilization of the 5-hour and
//! 7-day windows. This module fetches it and keeps the latest successful
//! result.
//!
//! ## Failure model
//!
//! The quota is optional. Missing credentials, network errors, timeouts,
//! non-200 responses and malformed bodies are all logged and turn into "no
//! new data". A failed fetch never clears a previous snapshot.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use usagegrid_core::quota::{QuotaMonitor, UsageApiClient};
//! use usagegrid_core::Config;
//!
//! # async fn run() -> usagegrid_core::Result<()> {
//! let config = Config::load()?;
//! let client = UsageApiClient::new(&config.quota, config.sources.credentials_path())?;
//! let monitor = QuotaMonitor::new();
//! if monitor.refresh(&client).await {
//!     println!("{:?}", monitor.latest());
//! }
//! # Ok(())
//! # }
//! ```

mod client;
mod credentials;

pub use client::{parse_usage_response, UsageApiClient};
pub use credentials::{decode_keychain_output, parse_credentials, OAuthCredentials, TokenProvider};

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

/// Utilization of one quota window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct UsageWindow {
    /// Percentage used, 0–100.
    pub utilization: f64,
    pub resets_at: Option<DateTime<Utc>>,
}

impl UsageWindow {
    pub fn level(&self) -> UtilizationLevel {
        UtilizationLevel::from_utilization(self.utilization)
    }

    /// Utilization as a fraction clamped to `0.0..=1.0`.
    pub fn fraction(&self) -> f64 {
        (self.utilization / 100.0).clamp(0.0, 1.0)
    }
}

/// All windows reported by the endpoint. Any of them may be absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UsageWindows {
    pub five_hour: Option<UsageWindow>,
    pub seven_day: Option<UsageWindow>,
    pub seven_day_sonnet: Option<UsageWindow>,
    pub seven_day_opus: Option<UsageWindow>,
}

impl UsageWindows {
    /// Windows that are present, with display labels, in display order.
    pub fn labeled(&self) -> Vec<(&'static str, UsageWindow)> {
        [
            ("5-hour", self.five_hour),
            ("7-day", self.seven_day),
            ("7-day Sonnet", self.seven_day_sonnet),
            ("7-day Opus", self.seven_day_opus),
        ]
        .into_iter()
        .filter_map(|(label, window)| window.map(|w| (label, w)))
        .collect()
    }
}

/// Severity band for a utilization percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UtilizationLevel {
    Normal,
    Elevated,
    High,
    Critical,
}

impl UtilizationLevel {
    pub fn from_utilization(percent: f64) -> Self {
        if percent >= 90.0 {
            UtilizationLevel::Critical
        } else if percent >= 75.0 {
            UtilizationLevel::High
        } else if percent >= 50.0 {
            UtilizationLevel::Elevated
        } else {
            UtilizationLevel::Normal
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UtilizationLevel::Normal => "normal",
            UtilizationLevel::Elevated => "elevated",
            UtilizationLevel::High => "high",
            UtilizationLevel::Critical => "critical",
        }
    }
}

/// One successful fetch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuotaSnapshot {
    pub windows: UsageWindows,
    pub fetched_at: DateTime<Utc>,
    /// Subscription tier from the stored credentials, when known.
    pub plan: Option<String>,
}

/// Anything that can produce usage windows.
pub trait QuotaSource {
    /// Fetch the current windows, or `None` on any failure.
    fn fetch(&self) -> impl Future<Output = Option<UsageWindows>> + Send;

    /// Plan label to attach to snapshots.
    fn plan(&self) -> Option<String> {
        None
    }
}

/// Holds the most recent successful [`QuotaSnapshot`].
#[derive(Debug, Default)]
pub struct QuotaMonitor {
    latest: RwLock<Option<Arc<QuotaSnapshot>>>,
}

impl QuotaMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(&self) -> Option<Arc<QuotaSnapshot>> {
        self.latest
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Fetch once. Returns whether the snapshot was replaced.
    pub async fn refresh<S: QuotaSource>(&self, source: &S) -> bool {
        let Some(windows) = source.fetch().await else {
            return false;
        };
        let snapshot = Arc::new(QuotaSnapshot {
            windows,
            fetched_at: Utc::now(),
            plan: source.plan(),
        });
        *self.latest.write().unwrap_or_else(PoisonError::into_inner) = Some(snapshot);
        true
    }

    /// Refresh on a fixed interval in a background task, starting immediately.
    pub fn spawn_polling<S>(
        self: &Arc<Self>,
        source: S,
        interval: Duration,
    ) -> tokio::task::JoinHandle<()>
    where
        S: QuotaSource + Send + Sync + 'static,
    {
        let monitor = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if !monitor.refresh(&source).await {
                    tracing::debug!("Quota refresh produced no data");
                }
            }
        })
    }
}

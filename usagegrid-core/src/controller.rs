//! Refresh controller
//!
//! One worker thread owns the pipeline state. Refresh requests go through a
//! single-slot queue: while a pass is running, newer requests overwrite the
//! pending one, and a full reload absorbs a pending live refresh. When no
//! request arrives within the poll interval the worker runs a live refresh
//! on its own.
//!
//! Each pass produces a new [`UsageSnapshot`] that replaces the previous one
//! wholesale. Subscribers are called on the worker thread after the swap.

use crate::analytics::grid::{self, CalendarGrid};
use crate::analytics::stats::{LiveStats, MergedHistory, UsageTotals};
use crate::cache::{read_cache, CachedSummary};
use crate::config::Config;
use crate::error::Result;
use crate::types::{DayActivity, DayBucket, RollingWindowBucket};
use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, RwLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// What a refresh pass recomputes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RefreshKind {
    /// Today and the rolling window only.
    Live,
    /// Re-read the cache, recompute gap days, then everything `Live` covers.
    Full,
}

impl RefreshKind {
    /// Combine a pending request with a newer one.
    pub fn coalesce(self, newer: RefreshKind) -> RefreshKind {
        self.max(newer)
    }
}

/// Everything a frontend needs to render one frame.
#[derive(Debug, Clone, Serialize)]
pub struct UsageSnapshot {
    pub generated_at: DateTime<Utc>,
    pub today: NaiveDate,
    pub last_computed_date: Option<NaiveDate>,
    pub totals: UsageTotals,
    pub today_messages: u64,
    pub today_sessions: u64,
    pub rolling_window: RollingWindowBucket,
    pub window_hours: u32,
    pub window_limit: u64,
    pub grid: CalendarGrid,
}

impl UsageSnapshot {
    /// Share of the configured rolling-window limit used so far.
    pub fn window_usage_fraction(&self) -> f64 {
        self.rolling_window.usage_fraction(self.window_limit)
    }

    pub fn window_reset(&self) -> Option<DateTime<Utc>> {
        self.rolling_window.estimated_reset(self.window_hours)
    }
}

/// Inputs for a [`Pipeline`].
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub projects_dir: PathBuf,
    pub cache_path: PathBuf,
    pub weeks: u32,
    pub window_hours: u32,
    pub window_limit: u64,
}

impl From<&Config> for PipelineSettings {
    fn from(config: &Config) -> Self {
        Self {
            projects_dir: config.sources.projects_dir(),
            cache_path: config.sources.cache_path(),
            weeks: config.grid.weeks,
            window_hours: config.window.hours,
            window_limit: config.window.limit,
        }
    }
}

/// Pipeline state carried between passes.
///
/// Usable directly for one-shot computation; [`UsageController`] wraps it in
/// a worker thread.
#[derive(Debug)]
pub struct Pipeline {
    settings: PipelineSettings,
    stats: LiveStats,
    summary: CachedSummary,
    history: MergedHistory,
    /// Local date the history was computed for. `None` until the first full pass.
    computed_for: Option<NaiveDate>,
}

impl Pipeline {
    pub fn new(settings: PipelineSettings) -> Self {
        Self {
            stats: LiveStats::new(settings.projects_dir.clone()),
            settings,
            summary: CachedSummary::default(),
            history: MergedHistory::default(),
            computed_for: None,
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Run one pass at the current local time.
    pub fn refresh(&mut self, kind: RefreshKind) -> UsageSnapshot {
        self.refresh_at(kind, &Local::now())
    }

    /// Run one pass as if the time were `now`.
    ///
    /// A live refresh on a new local date is promoted to a full one, since
    /// yesterday has become a gap day.
    pub fn refresh_at<Tz: TimeZone>(
        &mut self,
        kind: RefreshKind,
        now: &DateTime<Tz>,
    ) -> UsageSnapshot {
        let today = now.date_naive();
        let kind = if self.computed_for != Some(today) {
            RefreshKind::Full
        } else {
            kind
        };

        if kind == RefreshKind::Full {
            self.reload(now);
        }

        let today_bucket: DayBucket = self.stats.today(now);
        let now_utc = now.with_timezone(&Utc);
        let rolling_window = self
            .stats
            .rolling_window(now_utc, self.settings.window_hours);

        let grid = grid::build(
            &self.history.daily,
            DayActivity::from(&today_bucket),
            self.settings.weeks,
            today,
        );

        tracing::debug!(
            ?kind,
            today_messages = today_bucket.message_count,
            window_messages = rolling_window.message_count,
            "Refresh pass complete"
        );

        UsageSnapshot {
            generated_at: now_utc,
            today,
            last_computed_date: self.summary.last_computed(),
            totals: self.history.totals,
            today_messages: today_bucket.message_count,
            today_sessions: today_bucket.session_count(),
            rolling_window,
            window_hours: self.settings.window_hours,
            window_limit: self.settings.window_limit,
            grid,
        }
    }

    fn reload<Tz: TimeZone>(&mut self, now: &DateTime<Tz>) {
        match read_cache(&self.settings.cache_path) {
            Ok(Some(summary)) => self.summary = summary,
            Ok(None) => self.summary = CachedSummary::default(),
            Err(e) => {
                tracing::warn!(
                    path = %self.settings.cache_path.display(),
                    error = %e,
                    "Malformed stats cache, keeping previous baseline"
                );
            }
        }

        let last_computed = self.summary.last_computed_date.as_deref();
        let gap = self.stats.recent_days(last_computed, now);
        self.history = MergedHistory::compute(&self.summary, &gap);
        self.computed_for = Some(now.date_naive());
    }
}

type Subscriber = Arc<dyn Fn(&Arc<UsageSnapshot>) + Send + Sync>;

#[derive(Default)]
struct Pending {
    request: Option<RefreshKind>,
    shutdown: bool,
}

#[derive(Default)]
struct Shared {
    pending: Mutex<Pending>,
    wake: Condvar,
    snapshot: RwLock<Option<Arc<UsageSnapshot>>>,
    subscribers: Mutex<Vec<Subscriber>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owns the refresh worker and the latest snapshot.
///
/// Dropping the controller stops the worker and waits for the current pass.
pub struct UsageController {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl UsageController {
    /// Spawn the worker and queue an initial full refresh.
    pub fn start(settings: PipelineSettings, poll_interval: Duration) -> Result<Self> {
        let shared = Arc::new(Shared::default());
        lock(&shared.pending).request = Some(RefreshKind::Full);

        let worker_shared = Arc::clone(&shared);
        let pipeline = Pipeline::new(settings);
        let worker = thread::Builder::new()
            .name("usagegrid-refresh".to_string())
            .spawn(move || run_worker(worker_shared, pipeline, poll_interval))?;

        tracing::info!(poll_secs = poll_interval.as_secs(), "Refresh worker started");

        Ok(Self {
            shared,
            worker: Some(worker),
        })
    }

    /// Queue a refresh, coalescing with any request already pending.
    pub fn request(&self, kind: RefreshKind) {
        let mut pending = lock(&self.shared.pending);
        pending.request = Some(match pending.request {
            Some(existing) => existing.coalesce(kind),
            None => kind,
        });
        self.shared.wake.notify_one();
    }

    /// The cache document changed.
    pub fn cache_changed(&self) {
        self.request(RefreshKind::Full);
    }

    /// Latest snapshot, if a pass has completed.
    pub fn snapshot(&self) -> Option<Arc<UsageSnapshot>> {
        self.shared
            .snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Register a callback invoked after every pass.
    pub fn subscribe<F>(&self, callback: F)
    where
        F: Fn(&Arc<UsageSnapshot>) + Send + Sync + 'static,
    {
        lock(&self.shared.subscribers).push(Arc::new(callback));
    }

    /// Stop the worker and wait for it to exit.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        lock(&self.shared.pending).shutdown = true;
        self.shared.wake.notify_one();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!("Refresh worker panicked");
            }
        }
    }
}

impl Drop for UsageController {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_worker(shared: Arc<Shared>, mut pipeline: Pipeline, poll_interval: Duration) {
    while let Some(kind) = next_request(&shared, poll_interval) {
        let snapshot = Arc::new(pipeline.refresh(kind));

        *shared
            .snapshot
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&snapshot));

        let subscribers = lock(&shared.subscribers).clone();
        for subscriber in subscribers {
            subscriber(&snapshot);
        }
    }
    tracing::info!("Refresh worker stopped");
}

/// Block until a request arrives or the poll interval elapses.
///
/// Returns `None` on shutdown.
fn next_request(shared: &Shared, poll_interval: Duration) -> Option<RefreshKind> {
    let deadline = Instant::now() + poll_interval;
    let mut pending = lock(&shared.pending);
    loop {
        if pending.shutdown {
            return None;
        }
        if let Some(kind) = pending.request.take() {
            return Some(kind);
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Some(RefreshKind::Live);
        }
        pending = shared
            .wake
            .wait_timeout(pending, remaining)
            .unwrap_or_else(PoisonError::into_inner)
            .0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, FixedOffset};
    use std::fs;
    use std::sync::mpsc;
    use tempfile::TempDir;

    fn settings(dir: &TempDir) -> PipelineSettings {
        PipelineSettings {
            projects_dir: dir.path().join("projects"),
            cache_path: dir.path().join("stats-cache.json"),
            weeks: 4,
            window_hours: 5,
            window_limit: 900,
        }
    }

    fn write_transcript(dir: &TempDir, name: &str, lines: &[String]) {
        let project = dir.path().join("projects").join("-home-me-app");
        fs::create_dir_all(&project).unwrap();
        fs::write(project.join(name), lines.join("\n")).unwrap();
    }

    fn line(kind: &str, ts: DateTime<Utc>, session: &str) -> String {
        format!(
            r#"{{"type":"{}","timestamp":"{}","sessionId":"{}"}}"#,
            kind,
            ts.to_rfc3339(),
            session
        )
    }

    #[test]
    fn test_coalesce() {
        use RefreshKind::*;
        assert_eq!(Live.coalesce(Live), Live);
        assert_eq!(Live.coalesce(Full), Full);
        assert_eq!(Full.coalesce(Live), Full);
    }

    #[test]
    fn test_pipeline_merges_cache_gap_and_today() {
        let dir = TempDir::new().unwrap();
        let now = Utc::now();
        let today = now.date_naive();
        let yesterday = today.pred_opt().unwrap();
        let two_days_ago = yesterday.pred_opt().unwrap();

        fs::write(
            dir.path().join("stats-cache.json"),
            format!(
                r#"{{"version":1,"lastComputedDate":"{}","dailyActivity":[
                    {{"date":"{}","messageCount":10,"sessionCount":1,"toolCallCount":2}}
                ],"totalMessages":10,"totalSessions":1}}"#,
                two_days_ago, two_days_ago
            ),
        )
        .unwrap();

        let yesterday_noon = Utc
            .from_utc_datetime(&yesterday.and_hms_opt(12, 0, 0).unwrap());
        let just_now = now - ChronoDuration::seconds(5);
        write_transcript(
            &dir,
            "s.jsonl",
            &[
                line("user", yesterday_noon, "a"),
                line("assistant", yesterday_noon + ChronoDuration::seconds(1), "a"),
                line("user", just_now, "b"),
            ],
        );

        let mut pipeline = Pipeline::new(settings(&dir));
        let snapshot = pipeline.refresh_at(RefreshKind::Live, &now);

        assert_eq!(snapshot.totals.total_messages, 12);
        assert_eq!(snapshot.totals.total_sessions, 2);
        assert_eq!(snapshot.today_messages, 1);
        assert_eq!(snapshot.today_sessions, 1);
        assert_eq!(snapshot.rolling_window.message_count, 1);
        assert_eq!(snapshot.last_computed_date, Some(two_days_ago));
    }

    #[test]
    fn test_malformed_cache_keeps_previous_baseline() {
        let dir = TempDir::new().unwrap();
        let cache = dir.path().join("stats-cache.json");
        let now = Utc::now();
        fs::write(
            &cache,
            format!(
                r#"{{"version":1,"lastComputedDate":"{}","totalMessages":42,"totalSessions":3}}"#,
                now.date_naive()
            ),
        )
        .unwrap();

        let mut pipeline = Pipeline::new(settings(&dir));
        assert_eq!(
            pipeline.refresh_at(RefreshKind::Full, &now).totals.total_messages,
            42
        );

        fs::write(&cache, "{ truncated").unwrap();
        assert_eq!(
            pipeline.refresh_at(RefreshKind::Full, &now).totals.total_messages,
            42
        );

        fs::remove_file(&cache).unwrap();
        assert_eq!(
            pipeline.refresh_at(RefreshKind::Full, &now).totals.total_messages,
            0
        );
    }

    #[test]
    fn test_live_refresh_on_new_date_is_promoted() {
        let dir = TempDir::new().unwrap();
        let tz = FixedOffset::east_opt(2 * 3600).unwrap();
        let day_one = tz.with_ymd_and_hms(2024, 6, 10, 23, 59, 0).unwrap();
        let day_two = tz.with_ymd_and_hms(2024, 6, 11, 0, 1, 0).unwrap();

        fs::write(
            dir.path().join("stats-cache.json"),
            r#"{"version":1,"lastComputedDate":"2024-06-09","totalMessages":0}"#,
        )
        .unwrap();
        write_transcript(
            &dir,
            "s.jsonl",
            &[line("user", day_one.with_timezone(&Utc) - ChronoDuration::minutes(1), "a")],
        );

        let mut pipeline = Pipeline::new(settings(&dir));
        let first = pipeline.refresh_at(RefreshKind::Full, &day_one);
        assert_eq!(first.today_messages, 1);
        assert_eq!(first.totals.total_messages, 0);

        // June 10 became a gap day after midnight
        let second = pipeline.refresh_at(RefreshKind::Live, &day_two);
        assert_eq!(second.today_messages, 0);
        assert_eq!(second.totals.total_messages, 1);
    }

    #[test]
    fn test_controller_publishes_snapshots() {
        let dir = TempDir::new().unwrap();
        write_transcript(&dir, "s.jsonl", &[line("user", Utc::now(), "a")]);

        let controller =
            UsageController::start(settings(&dir), Duration::from_secs(3600)).unwrap();
        let (tx, rx) = mpsc::channel();
        controller.subscribe(move |snapshot| {
            let _ = tx.send(Arc::clone(snapshot));
        });

        controller.request(RefreshKind::Live);
        let snapshot = rx.recv_timeout(Duration::from_secs(10)).unwrap();
        assert_eq!(snapshot.today_messages, 1);
        assert!(controller.snapshot().is_some());

        controller.shutdown();
    }

    #[test]
    fn test_controller_polls_without_requests() {
        let dir = TempDir::new().unwrap();
        let controller =
            UsageController::start(settings(&dir), Duration::from_millis(50)).unwrap();
        let (tx, rx) = mpsc::channel();
        controller.subscribe(move |snapshot| {
            let _ = tx.send(snapshot.generated_at);
        });

        let first = rx.recv_timeout(Duration::from_secs(10)).unwrap();
        let second = rx.recv_timeout(Duration::from_secs(10)).unwrap();
        assert!(second >= first);
    }
}

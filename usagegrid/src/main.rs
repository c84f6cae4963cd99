//! usagegrid - Claude Code usage tracker
//!
//! Shows a contribution-style calendar of Claude Code activity, today's live
//! counters, the rolling-window message count and the server-side quota.
//!
//! Uses XDG Base Directory specification for file locations:
//! - Logs: $XDG_STATE_HOME/usagegrid/usagegrid.log (~/.local/state/usagegrid/usagegrid.log)
//! - Config: $XDG_CONFIG_HOME/usagegrid/config.toml (~/.config/usagegrid/config.toml)

mod render;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use usagegrid_core::quota::{QuotaMonitor, UsageApiClient};
use usagegrid_core::{
    CacheWatcher, Config, Pipeline, PipelineSettings, RefreshKind, UsageController,
};

use crate::render::{render_quota, render_snapshot};

/// How often `watch` refetches the remote quota.
const QUOTA_POLL_INTERVAL: Duration = Duration::from_secs(300);

#[derive(Parser)]
#[command(name = "usagegrid")]
#[command(about = "Claude Code usage calendar, live counters and quota windows")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Print the calendar and counters once (default)
    Show {
        /// Output the snapshot as JSON
        #[arg(long)]
        json: bool,

        /// Number of weeks to show (overrides grid.weeks)
        #[arg(long)]
        weeks: Option<u32>,
    },
    /// Keep running, reprinting whenever usage changes
    Watch {
        /// Live refresh interval in seconds (overrides refresh.poll_interval_secs)
        #[arg(long)]
        interval: Option<u64>,
    },
    /// Fetch the server-side 5-hour and 7-day quota windows
    Quota {
        /// Output the quota snapshot as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = Config::load().context("failed to load configuration")?;

    // Initialize logging (to file, stdout is for output)
    let _log_guard =
        usagegrid_core::logging::init(&config.logging).context("failed to initialize logging")?;

    tracing::info!("usagegrid starting");

    let command = args.command.unwrap_or(Command::Show {
        json: false,
        weeks: None,
    });

    match command {
        Command::Show { json, weeks } => {
            if let Some(weeks) = weeks {
                config.grid.weeks = weeks;
            }
            config.validate().context("invalid options")?;
            run_show(&config, json)
        }
        Command::Watch { interval } => {
            if let Some(interval) = interval {
                config.refresh.poll_interval_secs = interval;
            }
            config.validate().context("invalid options")?;
            run_watch(&config)
        }
        Command::Quota { json } => run_quota(&config, json),
    }
}

/// One full pass, printed.
fn run_show(config: &Config, json: bool) -> Result<()> {
    let mut pipeline = Pipeline::new(PipelineSettings::from(config));
    let snapshot = pipeline.refresh(RefreshKind::Full);

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&snapshot).context("failed to serialize snapshot")?
        );
    } else {
        print!("{}", render_snapshot(&snapshot, Utc::now()));
    }

    tracing::info!(
        total_messages = snapshot.totals.total_messages,
        today_messages = snapshot.today_messages,
        "usagegrid show complete"
    );
    Ok(())
}

/// Run the refresh controller until Ctrl+C.
fn run_watch(config: &Config) -> Result<()> {
    // Set up signal handler for graceful shutdown
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    ctrlc::set_handler(move || {
        eprintln!("\nShutting down...");
        r.store(false, Ordering::SeqCst);
    })
    .context("failed to set Ctrl+C handler")?;

    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    let quota = Arc::new(QuotaMonitor::new());
    if config.quota.enabled {
        let client = UsageApiClient::new(&config.quota, config.sources.credentials_path())
            .context("failed to create quota client")?;
        let _guard = runtime.enter();
        let _quota_task = quota.spawn_polling(client, QUOTA_POLL_INTERVAL);
    }

    let controller = UsageController::start(
        PipelineSettings::from(config),
        config.refresh.poll_interval(),
    )
    .context("failed to start refresh worker")?;

    let printer_quota = Arc::clone(&quota);
    controller.subscribe(move |snapshot| {
        let now = Utc::now();
        let timestamp = chrono::Local::now().format("%H:%M:%S");
        let mut text = format!("[{}]\n{}", timestamp, render_snapshot(snapshot, now));
        if let Some(q) = printer_quota.latest() {
            text.push('\n');
            text.push_str(&render_quota(&q, now));
        }
        println!("{}", text);
    });

    let controller = Arc::new(controller);
    let notify = Arc::clone(&controller);
    let cache_path = config.sources.cache_path();
    // The Claude directory may not exist yet; polling still covers transcripts.
    let watcher = match CacheWatcher::start(&cache_path, config.refresh.debounce(), move || {
        notify.cache_changed()
    }) {
        Ok(watcher) => Some(watcher),
        Err(e) => {
            tracing::warn!(path = %cache_path.display(), error = %e, "Not watching stats cache");
            None
        }
    };

    println!(
        "Watch mode active (refresh every {}s). Press Ctrl+C to stop.",
        config.refresh.poll_interval_secs
    );
    println!();

    while running.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_millis(200));
    }

    drop(watcher);
    runtime.shutdown_background();

    println!("Watch mode stopped.");
    tracing::info!("usagegrid watch mode stopped");
    Ok(())
}

/// Fetch the quota once, printed.
fn run_quota(config: &Config, json: bool) -> Result<()> {
    if !config.quota.enabled {
        println!("Quota fetching is disabled (quota.enabled = false)");
        return Ok(());
    }

    let client = UsageApiClient::new(&config.quota, config.sources.credentials_path())
        .context("failed to create quota client")?;
    let monitor = QuotaMonitor::new();

    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    let fetched = runtime.block_on(monitor.refresh(&client));

    let latest = monitor.latest();
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&latest.as_deref())
                .context("failed to serialize quota")?
        );
    } else if let Some(snapshot) = latest {
        print!("{}", render_quota(&snapshot, Utc::now()));
    } else {
        println!(
            "Quota unavailable (see {})",
            usagegrid_core::logging::log_file_path().display()
        );
    }

    tracing::info!(fetched, "usagegrid quota complete");
    Ok(())
}

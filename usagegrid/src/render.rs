//! Plain-text rendering of snapshots for the terminal.

use std::fmt::Write;

use chrono::{DateTime, Utc};
use usagegrid_core::analytics::CalendarCell;
use usagegrid_core::format::{
    format_count, format_percent, format_reset_countdown, format_reset_countdown_opt,
};
use usagegrid_core::quota::QuotaSnapshot;
use usagegrid_core::{Intensity, UsageSnapshot};

const ROW_LABELS: [&str; 5] = ["Mon", "Tue", "Wed", "Thu", "Fri"];
const LABEL_WIDTH: usize = 4;
const CELL_WIDTH: usize = 2;

fn glyph(cell: &CalendarCell) -> char {
    if cell.is_future {
        return ' ';
    }
    match cell.intensity {
        Intensity::Empty => '·',
        Intensity::Low => '░',
        Intensity::Medium => '▒',
        Intensity::High => '▓',
        Intensity::VeryHigh => '█',
    }
}

/// Render counters, rolling window and the calendar grid.
pub fn render_snapshot(snapshot: &UsageSnapshot, now: DateTime<Utc>) -> String {
    let mut out = String::new();

    let _ = writeln!(
        out,
        "Total: {} messages, {} sessions",
        format_count(snapshot.totals.total_messages),
        format_count(snapshot.totals.total_sessions)
    );
    let _ = writeln!(
        out,
        "Today: {} messages, {} sessions",
        format_count(snapshot.today_messages),
        format_count(snapshot.today_sessions)
    );
    let _ = writeln!(
        out,
        "Last {}h: {} / {} messages ({}), resets in {}",
        snapshot.window_hours,
        format_count(snapshot.rolling_window.message_count),
        format_count(snapshot.window_limit),
        format_percent(snapshot.window_usage_fraction()),
        format_reset_countdown_opt(snapshot.window_reset(), now)
    );
    if let Some(date) = snapshot.last_computed_date {
        let _ = writeln!(out, "Cache computed through {}", date);
    }
    out.push('\n');

    out.push_str(&month_row(snapshot));
    for (row, label) in ROW_LABELS.iter().enumerate() {
        let _ = write!(out, "{:<width$}", label, width = LABEL_WIDTH);
        for week in &snapshot.grid.weeks {
            let ch = week.cells.get(row).map_or(' ', glyph);
            let _ = write!(out, "{:<width$}", ch, width = CELL_WIDTH);
        }
        out.push('\n');
    }
    let _ = writeln!(out, "{:<width$}Less · ░ ▒ ▓ █ More", "", width = LABEL_WIDTH);

    out
}

fn month_row(snapshot: &UsageSnapshot) -> String {
    let mut row = " ".repeat(LABEL_WIDTH);
    for label in &snapshot.grid.month_labels {
        let column = LABEL_WIDTH + label.week_index * CELL_WIDTH;
        let used = row.chars().count();
        if column < used {
            continue;
        }
        row.push_str(&" ".repeat(column - used));
        row.push_str(&label.label);
        row.push(' ');
    }
    let mut row = row.trim_end().to_string();
    row.push('\n');
    row
}

/// Render quota windows, one per line.
pub fn render_quota(snapshot: &QuotaSnapshot, now: DateTime<Utc>) -> String {
    let mut out = String::new();
    if let Some(plan) = &snapshot.plan {
        let _ = writeln!(out, "Plan: {}", plan);
    }
    let windows = snapshot.windows.labeled();
    if windows.is_empty() {
        out.push_str("No quota windows reported\n");
    }
    for (label, window) in windows {
        let resets = window
            .resets_at
            .map(|r| format!(", resets in {}", format_reset_countdown(r, now)))
            .unwrap_or_default();
        let _ = writeln!(
            out,
            "{:<13}{:>4.0}% ({}){}",
            label,
            window.utilization,
            window.level().as_str(),
            resets
        );
    }
    out
}

//! Contribution-style calendar grid
//!
//! The grid ends on the Sunday that closes the current (Monday-start) week
//! and reaches `weeks * 7` days back. Each week column is narrowed to its
//! Monday–Friday cells.

use crate::types::{DayActivity, Intensity};
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::Serialize;
use std::collections::BTreeMap;

/// Weekday cells kept per week column.
pub const WEEKDAYS_PER_WEEK: usize = 5;

/// One day in the grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarCell {
    pub date: NaiveDate,
    pub message_count: u64,
    pub session_count: u64,
    pub tool_call_count: u64,
    pub intensity: Intensity,
    pub is_today: bool,
    pub is_future: bool,
}

impl CalendarCell {
    fn new(date: NaiveDate, activity: DayActivity, is_today: bool) -> Self {
        Self {
            date,
            message_count: activity.message_count,
            session_count: activity.session_count,
            tool_call_count: activity.tool_call_count,
            intensity: Intensity::from_message_count(activity.message_count),
            is_today,
            is_future: false,
        }
    }

    fn future(date: NaiveDate) -> Self {
        Self {
            is_future: true,
            ..Self::new(date, DayActivity::default(), false)
        }
    }

    /// Hover text, e.g. "25 messages on Jun 5, 2024".
    pub fn tooltip(&self) -> String {
        let day = self.date.format("%b %-d, %Y");
        if self.message_count == 0 {
            format!("No activity on {}", day)
        } else {
            format!("{} messages on {}", self.message_count, day)
        }
    }
}

/// One column of the grid, Monday through Friday.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarWeek {
    pub cells: Vec<CalendarCell>,
}

impl CalendarWeek {
    /// Cells up to and including today.
    pub fn visible(&self) -> impl Iterator<Item = &CalendarCell> {
        self.cells.iter().filter(|c| !c.is_future)
    }
}

/// A month name placed above the column where the month first appears.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthLabel {
    pub label: String,
    pub week_index: usize,
}

/// The full grid view model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CalendarGrid {
    pub weeks: Vec<CalendarWeek>,
    pub month_labels: Vec<MonthLabel>,
}

impl CalendarGrid {
    pub fn today_cell(&self) -> Option<&CalendarCell> {
        self.weeks
            .iter()
            .rev()
            .flat_map(|w| w.cells.iter())
            .find(|c| c.is_today)
    }

    pub fn cells(&self) -> impl Iterator<Item = &CalendarCell> {
        self.weeks.iter().flat_map(|w| w.cells.iter())
    }
}

/// The Sunday closing the Monday-start week that contains `date`.
pub fn end_of_week(date: NaiveDate) -> NaiveDate {
    let days_to_sunday = 6 - i64::from(date.weekday().num_days_from_monday());
    date + Duration::days(days_to_sunday)
}

/// Build the grid from merged daily activity.
///
/// Dates after `today` become future cells with zero counts. `today` takes
/// its counts from `today_live`, never from `daily`. Other dates default to
/// zero activity when absent.
pub fn build(
    daily: &BTreeMap<NaiveDate, DayActivity>,
    today_live: DayActivity,
    weeks: u32,
    today: NaiveDate,
) -> CalendarGrid {
    let weeks = weeks as usize;
    let end = end_of_week(today);
    let start = end - Duration::days((weeks * 7) as i64 - 1);

    let mut grid = CalendarGrid::default();
    let mut last_month: Option<(i32, u32)> = None;

    for week_index in 0..weeks {
        let monday = start + Duration::days((week_index * 7) as i64);
        let mut cells = Vec::with_capacity(WEEKDAYS_PER_WEEK);

        for date in monday.iter_days().take(WEEKDAYS_PER_WEEK) {
            debug_assert!(date.weekday() != Weekday::Sat && date.weekday() != Weekday::Sun);

            if date > today {
                cells.push(CalendarCell::future(date));
                continue;
            }

            let month = (date.year(), date.month());
            if last_month != Some(month) {
                grid.month_labels.push(MonthLabel {
                    label: date.format("%b").to_string(),
                    week_index,
                });
                last_month = Some(month);
            }

            let cell = if date == today {
                CalendarCell::new(date, today_live, true)
            } else {
                CalendarCell::new(date, daily.get(&date).copied().unwrap_or_default(), false)
            };
            cells.push(cell);
        }

        grid.weeks.push(CalendarWeek { cells });
    }

    grid
}

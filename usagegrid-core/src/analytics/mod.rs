//! Analytics over parsed activity records
//!
//! - [`aggregate`]: range bucketing (day ranges, gap days, rolling window)
//! - [`stats`]: live per-request pipelines and baseline merging
//! - [`grid`]: the weekday calendar grid view model

pub mod aggregate;
pub mod grid;
pub mod stats;

pub use aggregate::{
    aggregate, day_range, gap_day_ranges, start_of_day, RangeAggregator, RollingWindowAggregator,
    TimeRange,
};
pub use grid::{CalendarCell, CalendarGrid, CalendarWeek, MonthLabel};
pub use stats::{merge_daily, LiveStats, MergedHistory, UsageTotals};

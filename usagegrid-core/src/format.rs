//! Formatting helpers shared by the CLI and any other frontends.

use chrono::{DateTime, Utc};

/// Format the time remaining until `reset` (e.g., "2h 15m", "45m").
///
/// A reset in the past, or under a minute away, reads "now".
pub fn format_reset_countdown(reset: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let remaining = reset.signed_duration_since(now);
    let minutes = remaining.num_minutes();

    if minutes <= 0 {
        "now".to_string()
    } else if minutes < 60 {
        format!("{}m", minutes)
    } else if minutes < 24 * 60 {
        format!("{}h {}m", minutes / 60, minutes % 60)
    } else {
        let hours = minutes / 60;
        format!("{}d {}h", hours / 24, hours % 24)
    }
}

/// Format an optional reset time, or "-" if unknown.
pub fn format_reset_countdown_opt(reset: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    match reset {
        Some(reset) => format_reset_countdown(reset, now),
        None => "-".to_string(),
    }
}

/// Format a fraction in `0.0..=1.0` as a whole percentage.
pub fn format_percent(fraction: f64) -> String {
    format!("{:.0}%", (fraction * 100.0).clamp(0.0, 100.0))
}

/// Thousands-separated count (e.g., "12,345").
pub fn format_count(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 10, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_countdown() {
        let now = now();
        assert_eq!(
            format_reset_countdown(now + Duration::minutes(135), now),
            "2h 15m"
        );
        assert_eq!(format_reset_countdown(now + Duration::minutes(45), now), "45m");
        assert_eq!(format_reset_countdown(now + Duration::seconds(30), now), "now");
        assert_eq!(format_reset_countdown(now - Duration::hours(1), now), "now");
        assert_eq!(format_reset_countdown(now + Duration::hours(50), now), "2d 2h");
        assert_eq!(format_reset_countdown_opt(None, now), "-");
    }

    #[test]
    fn test_percent_and_count() {
        assert_eq!(format_percent(0.424), "42%");
        assert_eq!(format_percent(1.7), "100%");
        assert_eq!(format_count(0), "0");
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(1000), "1,000");
        assert_eq!(format_count(1234567), "1,234,567");
    }
}

//! Timestamped log-line formatting.
//!
//! Observer output is a flat stream of `[HH:MM:SS] message` lines, the same
//! shape a status screen or a plain log file expects.

use chrono::{DateTime, TimeZone};

/// Wall-clock label used as the log-line prefix.
pub fn clock_label<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    at.format("%H:%M:%S").to_string()
}

/// Formats a message with a `[HH:MM:SS]` prefix.
pub fn format_line<Tz: TimeZone>(at: &DateTime<Tz>, message: &str) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("[{}] {}", clock_label(at), message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_clock_label_is_zero_padded() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 3).unwrap();
        assert_eq!(clock_label(&at), "07:05:03");
    }

    #[test]
    fn test_format_line() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 21, 45, 0).unwrap();
        assert_eq!(
            format_line(&at, "No commands found"),
            "[21:45:00] No commands found"
        );
    }
}

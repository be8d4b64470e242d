//! Human-readable duration formatting
//!
//! Work durations are displayed as whole hours and remaining whole minutes
//! (`"7h 30m"`). Both parts are truncated from the millisecond value, never
//! rounded: 59 999 ms is `"0h 0m"`.

const MS_PER_MINUTE: i64 = 60 * 1000;
const MS_PER_HOUR: i64 = 60 * MS_PER_MINUTE;

/// Format a millisecond duration as `"{h}h {m}m"`.
///
/// Negative durations are treated as zero.
///
/// # Examples
///
/// ```
/// use acs_common::human_time::format_hours_minutes;
///
/// assert_eq!(format_hours_minutes(0), "0h 0m");
/// assert_eq!(format_hours_minutes(3 * 3_600_000), "3h 0m");
/// assert_eq!(format_hours_minutes(4 * 3_600_000 + 59 * 60_000 + 59_999), "4h 59m");
/// ```
pub fn format_hours_minutes(duration_ms: i64) -> String {
    let ms = duration_ms.max(0);
    let hours = ms / MS_PER_HOUR;
    let minutes = (ms % MS_PER_HOUR) / MS_PER_MINUTE;
    format!("{}h {}m", hours, minutes)
}

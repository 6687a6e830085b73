//! Date bucketing trait implemented once per SQL backend

use chrono::NaiveDateTime;

use crate::date_util::format_timestamp;
use crate::query::interval::IntervalUnit;

/// Generates the date expressions a trend query needs for one backend.
///
/// Every `(dialect, interval)` pair is covered by an exhaustive `match`
/// in each implementation; adding an interval without updating all three
/// dialects fails to compile.
pub trait DialectFormatter: Send + Sync {
    /// Get the dialect name
    fn name(&self) -> &'static str;

    /// Render `col` as the bucket label for `unit`
    ///
    /// - SQLite: `STRFTIME('%Y-%m-%d', col)`
    /// - PostgreSQL: `TO_CHAR(col, 'YYYY-MM-DD')`
    /// - MySQL: `DATE_FORMAT(col, '%Y-%m-%d')`
    ///
    /// For `DayOfWeek` this is the dialect's numeric weekday index; see
    /// [`DialectFormatter::weekday_from_sunday`].
    fn label(&self, unit: IntervalUnit, col: &str) -> String;

    /// Advance `col` by `step` units
    ///
    /// - SQLite: `DATETIME(col, '+1 days')`
    /// - PostgreSQL: `col + INTERVAL '1 days'`
    /// - MySQL: `DATE_ADD(col, INTERVAL 1 DAY)`
    fn increment(&self, unit: IntervalUnit, step: u32, col: &str) -> String;

    /// Typed timestamp literal usable as the recursive seed row
    fn seed(&self, ts: NaiveDateTime) -> String;

    /// Set operator joining the seed and the recursive step
    fn union(&self) -> &'static str {
        "UNION"
    }

    /// Convert a weekday index as returned by [`DialectFormatter::label`]
    /// into days after Sunday (0 = Sunday … 6 = Saturday)
    fn weekday_from_sunday(&self, index: i64) -> Option<u32>;

    /// Plain quoted timestamp literal for comparisons
    fn literal(&self, ts: NaiveDateTime) -> String {
        format!("'{}'", format_timestamp(ts))
    }
}

/// English weekday names indexed by days after Sunday.
pub const WEEKDAY_NAMES: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

pub fn weekday_name(days_from_sunday: u32) -> Option<&'static str> {
    WEEKDAY_NAMES.get(days_from_sunday as usize).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weekday_name() {
        assert_eq!(weekday_name(0), Some("Sunday"));
        assert_eq!(weekday_name(6), Some("Saturday"));
        assert_eq!(weekday_name(7), None);
    }
}

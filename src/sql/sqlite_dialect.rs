//! SQLite date bucketing

use chrono::NaiveDateTime;

use super::DialectFormatter;
use crate::query::interval::IntervalUnit;

/// SQLite dialect. Also the fallback for unrecognized backends.
pub struct SqliteDialect;

impl SqliteDialect {
    /// ISO week label. `%G`/`%V` need SQLite 3.46; on older engines they
    /// render NULL and the CASE arm rebuilds the week from `%W`, which
    /// counts Monday-start weeks from 0 and has to be shifted by one, with
    /// week 53 spilling into the next year's W01.
    fn week_label(col: &str) -> String {
        let mut case = format!("CASE 0+STRFTIME('%W', {col}) WHEN 53 THEN CONCAT(1+STRFTIME('%Y', {col}), '-W01') WHEN 0 THEN STRFTIME('%Y-W01', {col})");
        for week in 1..=8 {
            case.push_str(&format!(
                " WHEN {week} THEN STRFTIME('%Y-W{:02}', {col})",
                week + 1
            ));
        }
        case.push_str(&format!(
            " ELSE CONCAT(STRFTIME('%Y-W', {col}), 1+STRFTIME('%W', {col})) END"
        ));
        format!("COALESCE(STRFTIME('%G-W%V', {col}), {case})")
    }
}

impl DialectFormatter for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn label(&self, unit: IntervalUnit, col: &str) -> String {
        let format = match unit {
            IntervalUnit::Second => "%Y-%m-%d %H:%M:%S",
            IntervalUnit::Minute => "%Y-%m-%d %H:%M",
            IntervalUnit::Hour => "%Y-%m-%d %H",
            IntervalUnit::Day => "%Y-%m-%d",
            IntervalUnit::DayOfWeek => "%w",
            IntervalUnit::Week => return Self::week_label(col),
            IntervalUnit::Month => "%Y-%m",
            IntervalUnit::Year => "%Y",
        };
        format!("STRFTIME('{format}', {col})")
    }

    fn increment(&self, unit: IntervalUnit, step: u32, col: &str) -> String {
        // No week modifier in SQLite.
        let modifier = match unit {
            IntervalUnit::Second => format!("{step} seconds"),
            IntervalUnit::Minute => format!("{step} minutes"),
            IntervalUnit::Hour => format!("{step} hours"),
            IntervalUnit::Day | IntervalUnit::DayOfWeek => format!("{step} days"),
            IntervalUnit::Week => format!("{} days", step as u64 * 7),
            IntervalUnit::Month => format!("{step} months"),
            IntervalUnit::Year => format!("{step} years"),
        };
        format!("DATETIME({col}, '+{modifier}')")
    }

    fn seed(&self, ts: NaiveDateTime) -> String {
        self.literal(ts)
    }

    fn union(&self) -> &'static str {
        "UNION ALL"
    }

    fn weekday_from_sunday(&self, index: i64) -> Option<u32> {
        // %w: 0 = Sunday
        (0..7).contains(&index).then_some(index as u32)
    }
}

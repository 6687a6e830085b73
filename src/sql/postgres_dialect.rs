//! PostgreSQL date bucketing

use chrono::NaiveDateTime;

use super::DialectFormatter;
use crate::query::interval::IntervalUnit;

/// PostgreSQL dialect
pub struct PostgresDialect;

impl DialectFormatter for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn label(&self, unit: IntervalUnit, col: &str) -> String {
        let format = match unit {
            IntervalUnit::Second => "YYYY-MM-DD HH24:MI:SS",
            IntervalUnit::Minute => "YYYY-MM-DD HH24:MI",
            IntervalUnit::Hour => "YYYY-MM-DD HH24",
            IntervalUnit::Day => "YYYY-MM-DD",
            IntervalUnit::DayOfWeek => "ID",
            IntervalUnit::Week => "IYYY-\"W\"IW",
            IntervalUnit::Month => "YYYY-MM",
            IntervalUnit::Year => "YYYY",
        };
        format!("TO_CHAR({col}, '{format}')")
    }

    fn increment(&self, unit: IntervalUnit, step: u32, col: &str) -> String {
        let unit = match unit {
            IntervalUnit::Second => "seconds",
            IntervalUnit::Minute => "minutes",
            IntervalUnit::Hour => "hours",
            IntervalUnit::Day | IntervalUnit::DayOfWeek => "days",
            IntervalUnit::Week => "weeks",
            IntervalUnit::Month => "months",
            IntervalUnit::Year => "years",
        };
        format!("{col} + INTERVAL '{step} {unit}'")
    }

    fn seed(&self, ts: NaiveDateTime) -> String {
        format!("{}::timestamp", self.literal(ts))
    }

    fn weekday_from_sunday(&self, index: i64) -> Option<u32> {
        // ID: 1 = Monday .. 7 = Sunday
        (1..=7).contains(&index).then_some((index % 7) as u32)
    }
}

//! MySQL / MariaDB date bucketing

use chrono::NaiveDateTime;

use super::DialectFormatter;
use crate::query::interval::IntervalUnit;

/// MySQL dialect
pub struct MysqlDialect;

impl DialectFormatter for MysqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn label(&self, unit: IntervalUnit, col: &str) -> String {
        let format = match unit {
            IntervalUnit::Second => "%Y-%m-%d %H:%i:%s",
            IntervalUnit::Minute => "%Y-%m-%d %H:%i",
            IntervalUnit::Hour => "%Y-%m-%d %H",
            IntervalUnit::Day => "%Y-%m-%d",
            IntervalUnit::DayOfWeek => return format!("DAYOFWEEK({col})"),
            IntervalUnit::Week => "%x-W%v",
            IntervalUnit::Month => "%Y-%m",
            IntervalUnit::Year => "%Y",
        };
        format!("DATE_FORMAT({col}, '{format}')")
    }

    fn increment(&self, unit: IntervalUnit, step: u32, col: &str) -> String {
        let unit = match unit {
            IntervalUnit::Second => "SECOND",
            IntervalUnit::Minute => "MINUTE",
            IntervalUnit::Hour => "HOUR",
            IntervalUnit::Day | IntervalUnit::DayOfWeek => "DAY",
            IntervalUnit::Week => "WEEK",
            IntervalUnit::Month => "MONTH",
            IntervalUnit::Year => "YEAR",
        };
        format!("DATE_ADD({col}, INTERVAL {step} {unit})")
    }

    fn seed(&self, ts: NaiveDateTime) -> String {
        format!("CAST({} AS DATETIME)", self.literal(ts))
    }

    fn weekday_from_sunday(&self, index: i64) -> Option<u32> {
        // DAYOFWEEK: 1 = Sunday .. 7 = Saturday
        (1..=7).contains(&index).then_some((index - 1) as u32)
    }
}

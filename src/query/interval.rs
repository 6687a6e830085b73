use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Bucket granularity of a trend series.
///
/// `DayOfWeek` steps like `Day` but is labelled with the weekday name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntervalUnit {
    Second,
    Minute,
    Hour,
    Day,
    DayOfWeek,
    Week,
    Month,
    Year,
}

impl IntervalUnit {
    pub const ALL: [IntervalUnit; 8] = [
        IntervalUnit::Second,
        IntervalUnit::Minute,
        IntervalUnit::Hour,
        IntervalUnit::Day,
        IntervalUnit::DayOfWeek,
        IntervalUnit::Week,
        IntervalUnit::Month,
        IntervalUnit::Year,
    ];

    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "second" | "seconds" => Ok(IntervalUnit::Second),
            "minute" | "minutes" => Ok(IntervalUnit::Minute),
            "hour" | "hours" => Ok(IntervalUnit::Hour),
            "day" | "days" => Ok(IntervalUnit::Day),
            "day_of_week" | "weekday" => Ok(IntervalUnit::DayOfWeek),
            "week" | "weeks" => Ok(IntervalUnit::Week),
            "month" | "months" => Ok(IntervalUnit::Month),
            "year" | "years" => Ok(IntervalUnit::Year),
            other => Err(Error::InvalidArgument(format!("unknown interval: {other}"))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IntervalUnit::Second => "second",
            IntervalUnit::Minute => "minute",
            IntervalUnit::Hour => "hour",
            IntervalUnit::Day => "day",
            IntervalUnit::DayOfWeek => "day_of_week",
            IntervalUnit::Week => "week",
            IntervalUnit::Month => "month",
            IntervalUnit::Year => "year",
        }
    }

    /// Fixed seconds-per-unit used to turn a fractional interval count into
    /// a sub-interval offset. Months are 30 days and years 365 days.
    pub fn approx_seconds(&self) -> i64 {
        match self {
            IntervalUnit::Second => 1,
            IntervalUnit::Minute => 60,
            IntervalUnit::Hour => 3_600,
            IntervalUnit::Day | IntervalUnit::DayOfWeek => 86_400,
            IntervalUnit::Week => 604_800,
            IntervalUnit::Month => 2_592_000,
            IntervalUnit::Year => 31_536_000,
        }
    }
}

impl fmt::Display for IntervalUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate function applied per bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateKind {
    #[default]
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggregateKind {
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "count" => Ok(AggregateKind::Count),
            "sum" => Ok(AggregateKind::Sum),
            "avg" | "average" => Ok(AggregateKind::Avg),
            "min" => Ok(AggregateKind::Min),
            "max" => Ok(AggregateKind::Max),
            other => Err(Error::InvalidArgument(format!("unknown aggregate: {other}"))),
        }
    }

    pub fn sql_function(&self) -> &'static str {
        match self {
            AggregateKind::Count => "COUNT",
            AggregateKind::Sum => "SUM",
            AggregateKind::Avg => "AVG",
            AggregateKind::Min => "MIN",
            AggregateKind::Max => "MAX",
        }
    }

    /// Whether per-bucket results add up to the whole-range result.
    pub fn is_additive(&self) -> bool {
        matches!(self, AggregateKind::Count | AggregateKind::Sum)
    }
}

impl fmt::Display for AggregateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql_function().to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_interval_round_trips_names() {
        for unit in IntervalUnit::ALL {
            assert_eq!(IntervalUnit::parse(unit.as_str()).unwrap(), unit);
        }
    }

    #[test]
    fn test_parse_interval_aliases() {
        assert_eq!(IntervalUnit::parse("Days").unwrap(), IntervalUnit::Day);
        assert_eq!(
            IntervalUnit::parse("day-of-week").unwrap(),
            IntervalUnit::DayOfWeek
        );
        assert!(IntervalUnit::parse("fortnight").is_err());
    }

    #[test]
    fn test_aggregate_sql_function() {
        assert_eq!(AggregateKind::Count.sql_function(), "COUNT");
        assert_eq!(AggregateKind::Sum.sql_function(), "SUM");
        assert_eq!(AggregateKind::Avg.sql_function(), "AVG");
        assert_eq!(AggregateKind::Min.sql_function(), "MIN");
        assert_eq!(AggregateKind::Max.sql_function(), "MAX");
        assert_eq!(AggregateKind::parse("average").unwrap(), AggregateKind::Avg);
    }

    #[test]
    fn test_approx_seconds_conventions() {
        assert_eq!(IntervalUnit::Month.approx_seconds(), 30 * 86_400);
        assert_eq!(IntervalUnit::Year.approx_seconds(), 365 * 86_400);
        assert_eq!(IntervalUnit::DayOfWeek.approx_seconds(), 86_400);
    }
}

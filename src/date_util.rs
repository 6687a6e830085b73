use chrono::{
    DateTime, Datelike, Duration, Months, NaiveDate, NaiveDateTime, NaiveTime, Timelike,
};

use crate::error::{Error, Result};
use crate::query::interval::IntervalUnit;

/// Canonical textual form used for literals and labels.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const PARSE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Get the last day of a given month.
pub fn last_day_of_month(year: i32, month: u32) -> NaiveDate {
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    // Only the final month of the calendar has no successor.
    next.and_then(|d| d.pred_opt()).unwrap_or(NaiveDate::MAX)
}

pub fn start_of_day(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

pub fn end_of_day(date: NaiveDate) -> NaiveDateTime {
    start_of_day(date) + Duration::seconds(86_399)
}

/// Round a timestamp down to the first second of the unit containing it.
/// Weeks start on Monday. Partial weeks at the calendar's ends clamp to it.
pub fn start_of(ts: NaiveDateTime, unit: IntervalUnit) -> NaiveDateTime {
    let date = ts.date();
    let secs = ts.time().num_seconds_from_midnight() as i64;
    match unit {
        IntervalUnit::Second => start_of_day(date) + Duration::seconds(secs),
        IntervalUnit::Minute => start_of_day(date) + Duration::seconds(secs - secs % 60),
        IntervalUnit::Hour => start_of_day(date) + Duration::seconds(secs - secs % 3600),
        IntervalUnit::Day | IntervalUnit::DayOfWeek => start_of_day(date),
        IntervalUnit::Week => start_of_day(
            date.checked_sub_signed(Duration::days(date.weekday().num_days_from_monday() as i64))
                .unwrap_or(NaiveDate::MIN),
        ),
        IntervalUnit::Month => start_of_day(date - Duration::days(date.day0() as i64)),
        IntervalUnit::Year => start_of_day(date - Duration::days(date.ordinal0() as i64)),
    }
}

/// Round a timestamp up to the last second of the unit containing it.
pub fn end_of(ts: NaiveDateTime, unit: IntervalUnit) -> NaiveDateTime {
    let date = ts.date();
    match unit {
        IntervalUnit::Second => start_of(ts, IntervalUnit::Second),
        IntervalUnit::Minute => start_of(ts, IntervalUnit::Minute) + Duration::seconds(59),
        IntervalUnit::Hour => start_of(ts, IntervalUnit::Hour) + Duration::seconds(3_599),
        IntervalUnit::Day | IntervalUnit::DayOfWeek => end_of_day(date),
        IntervalUnit::Week => end_of_day(
            date.checked_add_signed(Duration::days(
                6 - date.weekday().num_days_from_monday() as i64,
            ))
            .unwrap_or(NaiveDate::MAX),
        ),
        IntervalUnit::Month => end_of_day(last_day_of_month(date.year(), date.month())),
        IntervalUnit::Year => end_of_day(last_day_of_month(date.year(), 12)),
    }
}

/// Advance (or rewind, for negative `n`) a timestamp by `n` calendar units.
/// Month and year arithmetic clamps to the last valid day of the target month.
pub fn add_units(ts: NaiveDateTime, unit: IntervalUnit, n: i64) -> Result<NaiveDateTime> {
    let shifted = match unit {
        IntervalUnit::Second => Duration::try_seconds(n).and_then(|d| ts.checked_add_signed(d)),
        IntervalUnit::Minute => Duration::try_minutes(n).and_then(|d| ts.checked_add_signed(d)),
        IntervalUnit::Hour => Duration::try_hours(n).and_then(|d| ts.checked_add_signed(d)),
        IntervalUnit::Day | IntervalUnit::DayOfWeek => {
            Duration::try_days(n).and_then(|d| ts.checked_add_signed(d))
        }
        IntervalUnit::Week => Duration::try_weeks(n).and_then(|d| ts.checked_add_signed(d)),
        IntervalUnit::Month => add_months(ts, n),
        IntervalUnit::Year => n.checked_mul(12).and_then(|m| add_months(ts, m)),
    };
    shifted.ok_or_else(|| {
        Error::InvalidArgument(format!(
            "cannot move {} by {n} {}",
            ts.format(TIMESTAMP_FORMAT),
            unit
        ))
    })
}

fn add_months(ts: NaiveDateTime, n: i64) -> Option<NaiveDateTime> {
    let months = Months::new(u32::try_from(n.unsigned_abs()).ok()?);
    if n >= 0 {
        ts.checked_add_months(months)
    } else {
        ts.checked_sub_months(months)
    }
}

/// Whole calendar units elapsed from `from` to `to`. Negative when `to`
/// precedes `from`.
pub fn units_between(from: NaiveDateTime, to: NaiveDateTime, unit: IntervalUnit) -> i64 {
    if to < from {
        return -units_between(to, from, unit);
    }
    let elapsed = to - from;
    match unit {
        IntervalUnit::Second => elapsed.num_seconds(),
        IntervalUnit::Minute => elapsed.num_minutes(),
        IntervalUnit::Hour => elapsed.num_hours(),
        IntervalUnit::Day | IntervalUnit::DayOfWeek => elapsed.num_days(),
        IntervalUnit::Week => elapsed.num_weeks(),
        IntervalUnit::Month => whole_months(from, to),
        IntervalUnit::Year => whole_months(from, to) / 12,
    }
}

fn whole_months(from: NaiveDateTime, to: NaiveDateTime) -> i64 {
    let mut months = (to.year() as i64 - from.year() as i64) * 12
        + (to.month() as i64 - from.month() as i64);
    // Back off while the candidate overshoots, e.g. Jan 31 -> Feb 28 is not a whole month.
    while months > 0 {
        match add_months(from, months) {
            Some(candidate) if candidate <= to => break,
            _ => months -= 1,
        }
    }
    months.max(0)
}

/// Parse a timestamp as stored by SQL engines or typed by a user.
/// Accepts `YYYY-MM-DD`, `YYYY-MM-DD HH:MM[:SS[.f]]`, the `T`-separated
/// variants, and RFC 3339 (the offset is dropped).
pub fn parse_timestamp(s: &str) -> Result<NaiveDateTime> {
    let s = s.trim();
    for fmt in PARSE_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(ts);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(start_of_day(date));
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Ok(ts.naive_local());
    }
    Err(Error::InvalidArgument(format!("unrecognized timestamp: {s}")))
}

pub fn format_timestamp(ts: NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

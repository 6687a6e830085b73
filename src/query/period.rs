use std::fmt;
use std::sync::LazyLock;

use chrono::{Duration, NaiveDateTime};
use regex::Regex;

use crate::date_util::{end_of, end_of_day, start_of, start_of_day, TIMESTAMP_FORMAT};
use crate::error::{Error, Result};
use crate::query::interval::IntervalUnit;

static RE_LAST_N: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^last_(\d+)_(seconds|minutes|hours|days)(_including_today|_with_today)?$").unwrap()
});

const LAST_MINUTES: [u32; 4] = [5, 10, 15, 30];
const LAST_HOURS: [u32; 4] = [2, 6, 12, 24];
const LAST_DAYS: [u32; 5] = [7, 30, 60, 90, 365];

/// A named date range relative to "now".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Last30Seconds,
    LastMinute,
    LastMinutes(u32),
    LastHour,
    LastHours(u32),
    LastDays(u32),
    LastDaysIncludingToday(u32),
    Today,
    Yesterday,
    MonthToDate,
    YearToDate,
    PreviousMinute,
    PreviousHour,
    PreviousMonth,
    PreviousYear,
}

impl Period {
    /// Every shorthand in the lookup table.
    pub fn all() -> Vec<Period> {
        let mut periods = vec![Period::Last30Seconds, Period::LastMinute];
        periods.extend(LAST_MINUTES.iter().map(|n| Period::LastMinutes(*n)));
        periods.push(Period::LastHour);
        periods.extend(LAST_HOURS.iter().map(|n| Period::LastHours(*n)));
        periods.extend(LAST_DAYS.iter().map(|n| Period::LastDays(*n)));
        periods.extend(LAST_DAYS.iter().map(|n| Period::LastDaysIncludingToday(*n)));
        periods.extend([
            Period::Today,
            Period::Yesterday,
            Period::MonthToDate,
            Period::YearToDate,
            Period::PreviousMinute,
            Period::PreviousHour,
            Period::PreviousMonth,
            Period::PreviousYear,
        ]);
        periods
    }

    /// Parse a period key.
    ///
    /// Supported keys:
    /// - `last_30_seconds`, `last_minute`, `last_hour`
    /// - `last_{5,10,15,30}_minutes`
    /// - `last_{2,6,12,24}_hours`
    /// - `last_{7,30,60,90,365}_days`, optionally `_including_today`
    /// - `today`, `yesterday`, `month_to_date`, `year_to_date`
    /// - `previous_minute`, `previous_hour`, `previous_month`, `previous_year`
    ///
    /// Matching ignores case and treats `-` and spaces as `_`. The older
    /// aliases `this_month`, `this_year`, `last_month`, `last_year` and the
    /// `_with_today` suffix are accepted too.
    pub fn parse(s: &str) -> Result<Self> {
        let key = s.trim().to_lowercase().replace(['-', ' '], "_");

        match key.as_str() {
            "last_minute" => return Ok(Period::LastMinute),
            "last_hour" => return Ok(Period::LastHour),
            "today" => return Ok(Period::Today),
            "yesterday" => return Ok(Period::Yesterday),
            "month_to_date" | "this_month" | "mtd" => return Ok(Period::MonthToDate),
            "year_to_date" | "this_year" | "ytd" => return Ok(Period::YearToDate),
            "previous_minute" | "last_minute_previous" => return Ok(Period::PreviousMinute),
            "previous_hour" | "last_hour_previous" => return Ok(Period::PreviousHour),
            "previous_month" | "last_month" => return Ok(Period::PreviousMonth),
            "previous_year" | "last_year" => return Ok(Period::PreviousYear),
            _ => {}
        }

        if let Some(caps) = RE_LAST_N.captures(&key) {
            let n: u32 = caps[1]
                .parse()
                .map_err(|_| Error::PeriodParse(format!("invalid count: {s}")))?;
            let including_today = caps.get(3).is_some();
            let period = match (&caps[2], including_today) {
                ("seconds", false) if n == 30 => Some(Period::Last30Seconds),
                ("minutes", false) if LAST_MINUTES.contains(&n) => Some(Period::LastMinutes(n)),
                ("hours", false) if LAST_HOURS.contains(&n) => Some(Period::LastHours(n)),
                ("days", false) if LAST_DAYS.contains(&n) => Some(Period::LastDays(n)),
                ("days", true) if LAST_DAYS.contains(&n) => {
                    Some(Period::LastDaysIncludingToday(n))
                }
                _ => None,
            };
            if let Some(period) = period {
                return Ok(period);
            }
        }

        Err(Error::PeriodParse(format!("unrecognized period: {s}")))
    }

    /// Canonical key string.
    pub fn to_key(&self) -> String {
        match self {
            Period::Last30Seconds => "last_30_seconds".into(),
            Period::LastMinute => "last_minute".into(),
            Period::LastMinutes(n) => format!("last_{n}_minutes"),
            Period::LastHour => "last_hour".into(),
            Period::LastHours(n) => format!("last_{n}_hours"),
            Period::LastDays(n) => format!("last_{n}_days"),
            Period::LastDaysIncludingToday(n) => format!("last_{n}_days_including_today"),
            Period::Today => "today".into(),
            Period::Yesterday => "yesterday".into(),
            Period::MonthToDate => "month_to_date".into(),
            Period::YearToDate => "year_to_date".into(),
            Period::PreviousMinute => "previous_minute".into(),
            Period::PreviousHour => "previous_hour".into(),
            Period::PreviousMonth => "previous_month".into(),
            Period::PreviousYear => "previous_year".into(),
        }
    }

    /// Inclusive `(from, to)` for this period, evaluated against a single
    /// captured `now`. Fails when a bound falls outside the calendar.
    pub fn date_range(&self, now: NaiveDateTime) -> Result<(NaiveDateTime, NaiveDateTime)> {
        let today = start_of_day(now.date());
        let range = match self {
            Period::Last30Seconds => (rewind(now, Duration::try_seconds(30))?, now),
            Period::LastMinute => (rewind(now, Duration::try_minutes(1))?, now),
            Period::LastMinutes(n) => (
                start_of(rewind(now, Duration::try_minutes(*n as i64))?, IntervalUnit::Minute),
                now,
            ),
            Period::LastHour => (rewind(now, Duration::try_hours(1))?, now),
            Period::LastHours(n) => (rewind(now, Duration::try_hours(*n as i64))?, now),
            Period::LastDays(n) => (
                rewind(today, Duration::try_days(*n as i64))?,
                end_of_day(rewind(today, Duration::try_days(1))?.date()),
            ),
            Period::LastDaysIncludingToday(n) => (
                rewind(today, Duration::try_days(*n as i64 - 1))?,
                end_of_day(today.date()),
            ),
            Period::Today => (today, end_of_day(today.date())),
            Period::Yesterday => {
                let yesterday = rewind(today, Duration::try_days(1))?;
                (yesterday, end_of_day(yesterday.date()))
            }
            Period::MonthToDate => (start_of(now, IntervalUnit::Month), end_of_day(today.date())),
            Period::YearToDate => (start_of(now, IntervalUnit::Year), end_of_day(today.date())),
            Period::PreviousMinute => {
                let prev = rewind(now, Duration::try_minutes(1))?;
                (
                    start_of(prev, IntervalUnit::Minute),
                    end_of(prev, IntervalUnit::Minute),
                )
            }
            Period::PreviousHour => {
                let prev = rewind(now, Duration::try_hours(1))?;
                (start_of(prev, IntervalUnit::Hour), end_of(prev, IntervalUnit::Hour))
            }
            Period::PreviousMonth => {
                // The day before the 1st always lies in the previous month.
                let prev = rewind(start_of(now, IntervalUnit::Month), Duration::try_days(1))?;
                (
                    start_of(prev, IntervalUnit::Month),
                    end_of(prev, IntervalUnit::Month),
                )
            }
            Period::PreviousYear => {
                let prev = rewind(start_of(now, IntervalUnit::Year), Duration::try_days(1))?;
                (start_of(prev, IntervalUnit::Year), end_of(prev, IntervalUnit::Year))
            }
        };
        Ok(range)
    }
}

/// `ts - by`, or `InvalidArgument` when either side leaves chrono's range.
fn rewind(ts: NaiveDateTime, by: Option<Duration>) -> Result<NaiveDateTime> {
    by.and_then(|d| ts.checked_sub_signed(d)).ok_or_else(|| {
        Error::InvalidArgument(format!(
            "period reaches past the supported calendar from {}",
            ts.format(TIMESTAMP_FORMAT)
        ))
    })
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::date_util::parse_timestamp;

    fn ts(s: &str) -> NaiveDateTime {
        parse_timestamp(s).unwrap()
    }

    fn now() -> NaiveDateTime {
        ts("2025-04-10 02:38:15")
    }

    #[test]
    fn test_parse_fixed_keys() {
        assert_eq!(Period::parse("today").unwrap(), Period::Today);
        assert_eq!(Period::parse("Month To Date").unwrap(), Period::MonthToDate);
        assert_eq!(Period::parse("last_month").unwrap(), Period::PreviousMonth);
        assert_eq!(Period::parse("this_year").unwrap(), Period::YearToDate);
        assert_eq!(
            Period::parse("last_hour_previous").unwrap(),
            Period::PreviousHour
        );
    }

    #[test]
    fn test_parse_last_n() {
        assert_eq!(Period::parse("last_30_seconds").unwrap(), Period::Last30Seconds);
        assert_eq!(Period::parse("last_15_minutes").unwrap(), Period::LastMinutes(15));
        assert_eq!(Period::parse("last-24-hours").unwrap(), Period::LastHours(24));
        assert_eq!(Period::parse("last_90_days").unwrap(), Period::LastDays(90));
        assert_eq!(
            Period::parse("last_7_days_including_today").unwrap(),
            Period::LastDaysIncludingToday(7)
        );
        assert_eq!(
            Period::parse("last_365_days_with_today").unwrap(),
            Period::LastDaysIncludingToday(365)
        );
    }

    #[test]
    fn test_parse_rejects_off_table_values() {
        assert!(Period::parse("last_8_days").is_err());
        assert!(Period::parse("last_3_hours").is_err());
        assert!(Period::parse("last_30_minutes_including_today").is_err());
        assert!(Period::parse("fortnight").is_err());
    }

    #[test]
    fn test_key_round_trip() {
        for period in Period::all() {
            assert_eq!(Period::parse(&period.to_key()).unwrap(), period);
        }
        assert_eq!(Period::all().len(), 29);
    }

    #[test]
    fn test_last_days_excludes_today() {
        assert_eq!(
            Period::LastDays(30).date_range(now()).unwrap(),
            (ts("2025-03-11 00:00:00"), ts("2025-04-09 23:59:59"))
        );
        assert_eq!(
            Period::LastDays(7).date_range(now()).unwrap(),
            (ts("2025-04-03 00:00:00"), ts("2025-04-09 23:59:59"))
        );
    }

    #[test]
    fn test_last_days_including_today() {
        assert_eq!(
            Period::LastDaysIncludingToday(30).date_range(now()).unwrap(),
            (ts("2025-03-12 00:00:00"), ts("2025-04-10 23:59:59"))
        );
    }

    #[test]
    fn test_sub_day_periods() {
        assert_eq!(
            Period::Last30Seconds.date_range(now()).unwrap(),
            (ts("2025-04-10 02:37:45"), now())
        );
        assert_eq!(
            Period::LastMinutes(10).date_range(now()).unwrap(),
            (ts("2025-04-10 02:28:00"), now())
        );
        assert_eq!(
            Period::LastHours(6).date_range(now()).unwrap(),
            (ts("2025-04-09 20:38:15"), now())
        );
        assert_eq!(
            Period::PreviousMinute.date_range(now()).unwrap(),
            (ts("2025-04-10 02:37:00"), ts("2025-04-10 02:37:59"))
        );
        assert_eq!(
            Period::PreviousHour.date_range(now()).unwrap(),
            (ts("2025-04-10 01:00:00"), ts("2025-04-10 01:59:59"))
        );
    }

    #[test]
    fn test_calendar_periods() {
        assert_eq!(
            Period::Yesterday.date_range(now()).unwrap(),
            (ts("2025-04-09 00:00:00"), ts("2025-04-09 23:59:59"))
        );
        assert_eq!(
            Period::MonthToDate.date_range(now()).unwrap(),
            (ts("2025-04-01 00:00:00"), ts("2025-04-10 23:59:59"))
        );
        assert_eq!(
            Period::YearToDate.date_range(now()).unwrap(),
            (ts("2025-01-01 00:00:00"), ts("2025-04-10 23:59:59"))
        );
        assert_eq!(
            Period::PreviousMonth.date_range(now()).unwrap(),
            (ts("2025-03-01 00:00:00"), ts("2025-03-31 23:59:59"))
        );
        assert_eq!(
            Period::PreviousYear.date_range(now()).unwrap(),
            (ts("2024-01-01 00:00:00"), ts("2024-12-31 23:59:59"))
        );
    }

    #[test]
    fn test_previous_month_in_january() {
        assert_eq!(
            Period::PreviousMonth.date_range(ts("2025-01-15 08:00:00")).unwrap(),
            (ts("2024-12-01 00:00:00"), ts("2024-12-31 23:59:59"))
        );
    }

    #[test]
    fn test_display_uses_key() {
        assert_eq!(Period::LastDays(7).to_string(), "last_7_days");
    }

    #[test]
    fn test_out_of_calendar_period_is_an_error() {
        let err = Period::LastDays(u32::MAX).date_range(now()).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert!(Period::LastMinutes(u32::MAX).date_range(now()).is_ok());
        assert!(Period::Yesterday.date_range(NaiveDateTime::MIN).is_err());
    }
}

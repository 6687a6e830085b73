use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Weekday};

use crate::date_util::{add_units, end_of, format_timestamp, start_of, start_of_day};
use crate::error::{Error, Result};
use crate::query::interval::IntervalUnit;
use crate::query::period::Period;

/// Inclusive date range. `from == None` means "from the earliest row".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub from: Option<NaiveDateTime>,
    pub to: NaiveDateTime,
}

impl DateRange {
    pub fn between(from: NaiveDateTime, to: NaiveDateTime) -> Self {
        Self {
            from: Some(from),
            to,
        }
    }

    pub fn from(from: NaiveDateTime, now: NaiveDateTime) -> Self {
        Self::between(from, now)
    }

    pub fn all(now: NaiveDateTime) -> Self {
        Self { from: None, to: now }
    }

    pub fn for_period(period: Period, now: NaiveDateTime) -> Result<Self> {
        let (from, to) = period.date_range(now)?;
        Ok(Self::between(from, to))
    }

    /// The whole day containing `date`.
    pub fn for_date(date: NaiveDate) -> Self {
        let start = start_of_day(date);
        Self::between(start, end_of(start, IntervalUnit::Day))
    }

    /// Minute `minute` of the current hour. Values past 59 roll into later hours.
    pub fn for_minute(minute: i64, now: NaiveDateTime) -> Result<Self> {
        Self::unit_at(start_of(now, IntervalUnit::Hour), IntervalUnit::Minute, minute)
    }

    /// Hour `hour` of the current day.
    pub fn for_hour(hour: i64, now: NaiveDateTime) -> Result<Self> {
        Self::unit_at(start_of(now, IntervalUnit::Day), IntervalUnit::Hour, hour)
    }

    /// Day `day` (1-based) of the current month. `0` is the previous month's last day.
    pub fn for_day(day: i64, now: NaiveDateTime) -> Result<Self> {
        Self::unit_at(start_of(now, IntervalUnit::Month), IntervalUnit::Day, day - 1)
    }

    /// ISO week `week` of the current ISO week-year, Monday through Sunday.
    pub fn for_week(week: i64, now: NaiveDateTime) -> Result<Self> {
        let iso_year = now.date().iso_week().year();
        let week_one = NaiveDate::from_isoywd_opt(iso_year, 1, Weekday::Mon).ok_or_else(|| {
            Error::InvalidArgument(format!("no ISO week 1 in year {iso_year}"))
        })?;
        Self::unit_at(start_of_day(week_one), IntervalUnit::Week, week - 1)
    }

    /// Month `month` (1-based) of the current year.
    pub fn for_month(month: i64, now: NaiveDateTime) -> Result<Self> {
        Self::unit_at(start_of(now, IntervalUnit::Year), IntervalUnit::Month, month - 1)
    }

    /// The calendar year `year`.
    pub fn for_year(year: i32) -> Result<Self> {
        let start = NaiveDate::from_ymd_opt(year, 1, 1)
            .ok_or_else(|| Error::InvalidArgument(format!("year out of range: {year}")))?;
        let start = start_of_day(start);
        Ok(Self::between(start, end_of(start, IntervalUnit::Year)))
    }

    fn unit_at(origin: NaiveDateTime, unit: IntervalUnit, offset: i64) -> Result<Self> {
        let start = add_units(origin, unit, offset)?;
        Ok(Self::between(start, end_of(start, unit)))
    }

    /// Start of the first bucket, or `None` when the lower bound is open.
    pub fn floor(&self, unit: IntervalUnit) -> Option<NaiveDateTime> {
        self.from.map(|from| start_of(from, unit))
    }

    /// End of the last bucket.
    pub fn ceil(&self, unit: IntervalUnit) -> NaiveDateTime {
        end_of(self.to, unit)
    }

    /// Replace an open lower bound with a discovered one.
    pub fn with_discovered_from(self, from: NaiveDateTime) -> Self {
        Self {
            from: Some(self.from.unwrap_or(from)),
            to: self.to,
        }
    }

    /// The abutting range immediately before this one.
    ///
    /// With `width = to - from`, the previous range is
    /// `[from - width, to - width - 1s]`, ending one second before `from`.
    pub fn previous(&self) -> Result<Self> {
        let from = self.from.ok_or_else(|| {
            Error::InvalidDateRange(
                "previous-period comparison needs a bounded range; all() has no start".into(),
            )
        })?;
        let width = self.to - from;
        let shift = |ts: NaiveDateTime, by: Duration| {
            ts.checked_sub_signed(by).ok_or_else(|| {
                Error::InvalidDateRange(format!(
                    "previous period of {} falls outside the supported calendar",
                    self.describe()
                ))
            })
        };
        let to = shift(self.to, width)?;
        Ok(Self::between(shift(from, width)?, shift(to, Duration::seconds(1))?))
    }

    pub fn describe(&self) -> String {
        match self.from {
            Some(from) => format!("{} .. {}", format_timestamp(from), format_timestamp(self.to)),
            None => format!(".. {}", format_timestamp(self.to)),
        }
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
    fn test_for_date_spans_whole_day() {
        let range = DateRange::for_date(ts("2025-04-05").date());
        assert_eq!(range.from, Some(ts("2025-04-05 00:00:00")));
        assert_eq!(range.to, ts("2025-04-05 23:59:59"));
    }

    #[test]
    fn test_for_unit_resolvers() {
        assert_eq!(
            DateRange::for_minute(5, now()).unwrap(),
            DateRange::between(ts("2025-04-10 02:05:00"), ts("2025-04-10 02:05:59"))
        );
        assert_eq!(
            DateRange::for_hour(13, now()).unwrap(),
            DateRange::between(ts("2025-04-10 13:00:00"), ts("2025-04-10 13:59:59"))
        );
        assert_eq!(
            DateRange::for_day(5, now()).unwrap(),
            DateRange::between(ts("2025-04-05 00:00:00"), ts("2025-04-05 23:59:59"))
        );
        assert_eq!(
            DateRange::for_month(2, now()).unwrap(),
            DateRange::between(ts("2025-02-01 00:00:00"), ts("2025-02-28 23:59:59"))
        );
        assert_eq!(
            DateRange::for_year(2024).unwrap(),
            DateRange::between(ts("2024-01-01 00:00:00"), ts("2024-12-31 23:59:59"))
        );
    }

    #[test]
    fn test_for_week_uses_iso_weeks() {
        // ISO week 1 of 2025 starts on Monday 2024-12-30.
        assert_eq!(
            DateRange::for_week(1, now()).unwrap(),
            DateRange::between(ts("2024-12-30 00:00:00"), ts("2025-01-05 23:59:59"))
        );
        assert_eq!(
            DateRange::for_week(15, now()).unwrap(),
            DateRange::between(ts("2025-04-07 00:00:00"), ts("2025-04-13 23:59:59"))
        );
    }

    #[test]
    fn test_for_day_overflow_rolls_back() {
        assert_eq!(
            DateRange::for_day(0, now()).unwrap(),
            DateRange::between(ts("2025-03-31 00:00:00"), ts("2025-03-31 23:59:59"))
        );
    }

    #[test]
    fn test_floor_and_ceil() {
        let range = DateRange::between(ts("2025-03-05 10:00:00"), ts("2025-03-19 10:00:00"));
        assert_eq!(range.floor(IntervalUnit::Week), Some(ts("2025-03-03")));
        assert_eq!(range.ceil(IntervalUnit::Week), ts("2025-03-23 23:59:59"));
        assert_eq!(range.floor(IntervalUnit::Month), Some(ts("2025-03-01")));
        assert_eq!(range.ceil(IntervalUnit::Year), ts("2025-12-31 23:59:59"));
        assert_eq!(DateRange::all(now()).floor(IntervalUnit::Day), None);
    }

    #[test]
    fn test_previous_abuts_current_range() {
        let range = DateRange::between(ts("2025-04-05 00:00:00"), ts("2025-04-05 23:59:59"));
        let prev = range.previous().unwrap();
        assert_eq!(prev.from, Some(ts("2025-04-04 00:00:01")));
        assert_eq!(prev.to, ts("2025-04-04 23:59:59"));
        assert_eq!(prev.to + Duration::seconds(1), range.from.unwrap());
    }

    #[test]
    fn test_previous_requires_lower_bound() {
        let err = DateRange::all(now()).previous().unwrap_err();
        assert!(matches!(err, Error::InvalidDateRange(_)));
    }

    #[test]
    fn test_previous_outside_calendar_is_an_error() {
        let ancient = start_of_day(NaiveDate::from_ymd_opt(-200_000, 1, 1).unwrap());
        let err = DateRange::between(ancient, now()).previous().unwrap_err();
        assert!(matches!(err, Error::InvalidDateRange(_)));
    }

    #[test]
    fn test_discovered_from_only_fills_open_bound() {
        let open = DateRange::all(now()).with_discovered_from(ts("2024-02-10"));
        assert_eq!(open.from, Some(ts("2024-02-10")));
        let closed = DateRange::between(ts("2025-01-01"), now())
            .with_discovered_from(ts("2024-02-10"));
        assert_eq!(closed.from, Some(ts("2025-01-01")));
    }
}

use chrono::{Local, NaiveDate, NaiveDateTime};

use crate::config::{MetricsConfig, MAX_PRECISION};
use crate::error::{Error, Result};
use crate::metrics::aggregate::{group_expression, qualify, select_expression};
use crate::metrics::projection::ProjectionModel;
use crate::metrics::types::{TrendSeries, ValueMetric};
use crate::metrics::{trend, value};
use crate::query::interval::{AggregateKind, IntervalUnit};
use crate::query::period::Period;
use crate::query::range::DateRange;
use crate::sql::Dialect;
use crate::storage::QueryExecutor;

/// How the date range is chosen. Resolved against a single `now` when a
/// terminal runs, so `at()` may come anywhere in the chain.
#[derive(Debug, Clone, Copy, PartialEq)]
enum RangeSpec {
    Period(Period),
    Between(NaiveDateTime, NaiveDateTime),
    From(NaiveDateTime),
    All,
    Date(NaiveDate),
    Minute(i64),
    Hour(i64),
    Day(i64),
    Week(i64),
    Month(i64),
    Year(i32),
}

/// Builder for a time-bucketed metric over one table.
///
/// Every setter consumes and returns the builder, so a base query can be
/// cloned and specialised without the variants affecting each other.
#[derive(Debug, Clone)]
pub struct MetricQuery {
    pub(crate) table: String,
    pub(crate) date_column: String,
    pub(crate) aggregate: AggregateKind,
    pub(crate) column: String,
    pub(crate) interval: IntervalUnit,
    pub(crate) step: u32,
    range: RangeSpec,
    pub(crate) group_by: Option<String>,
    pub(crate) filters: Vec<String>,
    pub(crate) fill_missing: bool,
    pub(crate) fill_value: i64,
    pub(crate) with_previous: bool,
    pub(crate) project_when: Option<f64>,
    pub(crate) project_for_date: Option<NaiveDateTime>,
    pub(crate) projection_model: ProjectionModel,
    pub(crate) precision: u32,
    now: Option<NaiveDateTime>,
}

impl MetricQuery {
    /// `COUNT(id)` by day over the previous month.
    pub fn new(table: &str) -> Self {
        let defaults = MetricsConfig::default();
        Self {
            table: table.to_string(),
            date_column: defaults.date_column,
            aggregate: AggregateKind::Count,
            column: defaults.column,
            interval: IntervalUnit::Day,
            step: 1,
            range: RangeSpec::Period(Period::PreviousMonth),
            group_by: None,
            filters: Vec::new(),
            fill_missing: false,
            fill_value: defaults.fill_value,
            with_previous: false,
            project_when: None,
            project_for_date: None,
            projection_model: defaults.projection_model,
            precision: defaults.precision,
            now: None,
        }
    }

    /// Apply column, precision, fill and projection defaults from `config`.
    pub fn with_config(mut self, config: &MetricsConfig) -> Self {
        self.date_column = config.date_column.clone();
        self.column = config.column.clone();
        self.precision = config.precision;
        self.fill_value = config.fill_value;
        self.projection_model = config.projection_model;
        self
    }

    pub fn table(mut self, name: &str) -> Self {
        self.table = name.to_string();
        self
    }

    pub fn date_column(mut self, column: &str) -> Self {
        self.date_column = column.to_string();
        self
    }

    // -- aggregates --

    pub fn aggregate(mut self, kind: AggregateKind, column: &str) -> Self {
        self.aggregate = kind;
        self.column = column.to_string();
        self
    }

    pub fn count(self, column: &str) -> Self {
        self.aggregate(AggregateKind::Count, column)
    }

    pub fn sum(self, column: &str) -> Self {
        self.aggregate(AggregateKind::Sum, column)
    }

    pub fn average(self, column: &str) -> Self {
        self.aggregate(AggregateKind::Avg, column)
    }

    pub fn min(self, column: &str) -> Self {
        self.aggregate(AggregateKind::Min, column)
    }

    pub fn max(self, column: &str) -> Self {
        self.aggregate(AggregateKind::Max, column)
    }

    // -- date range --

    pub fn between(mut self, from: NaiveDateTime, to: NaiveDateTime) -> Self {
        self.range = RangeSpec::Between(from, to);
        self
    }

    /// From `from` until now.
    pub fn from(mut self, from: NaiveDateTime) -> Self {
        self.range = RangeSpec::From(from);
        self
    }

    /// From the earliest row until now.
    pub fn all(mut self) -> Self {
        self.range = RangeSpec::All;
        self
    }

    pub fn for_period(mut self, period: Period) -> Self {
        self.range = RangeSpec::Period(period);
        self
    }

    pub fn for_date(mut self, date: NaiveDate) -> Self {
        self.range = RangeSpec::Date(date);
        self
    }

    pub fn for_minute(mut self, minute: i64) -> Self {
        self.range = RangeSpec::Minute(minute);
        self
    }

    pub fn for_hour(mut self, hour: i64) -> Self {
        self.range = RangeSpec::Hour(hour);
        self
    }

    pub fn for_day(mut self, day: i64) -> Self {
        self.range = RangeSpec::Day(day);
        self
    }

    pub fn for_week(mut self, week: i64) -> Self {
        self.range = RangeSpec::Week(week);
        self
    }

    pub fn for_month(mut self, month: i64) -> Self {
        self.range = RangeSpec::Month(month);
        self
    }

    pub fn for_year(mut self, year: i32) -> Self {
        self.range = RangeSpec::Year(year);
        self
    }

    // -- bucketing --

    pub fn by(mut self, interval: IntervalUnit, step: u32) -> Self {
        self.interval = interval;
        self.step = step;
        self
    }

    pub fn by_second(self, step: u32) -> Self {
        self.by(IntervalUnit::Second, step)
    }

    pub fn by_minute(self, step: u32) -> Self {
        self.by(IntervalUnit::Minute, step)
    }

    pub fn by_hour(self, step: u32) -> Self {
        self.by(IntervalUnit::Hour, step)
    }

    pub fn by_day(self, step: u32) -> Self {
        self.by(IntervalUnit::Day, step)
    }

    pub fn by_day_of_week(self, step: u32) -> Self {
        self.by(IntervalUnit::DayOfWeek, step)
    }

    pub fn by_week(self, step: u32) -> Self {
        self.by(IntervalUnit::Week, step)
    }

    pub fn by_month(self, step: u32) -> Self {
        self.by(IntervalUnit::Month, step)
    }

    pub fn by_year(self, step: u32) -> Self {
        self.by(IntervalUnit::Year, step)
    }

    // -- shaping --

    /// Partition results by a column or SQL expression. A trailing
    /// `AS alias` is dropped.
    pub fn group_by(mut self, expression: &str) -> Self {
        self.group_by = Some(expression.to_string());
        self
    }

    /// Raw SQL predicate ANDed into every statement this query runs.
    pub fn filter(mut self, predicate: &str) -> Self {
        self.filters.push(predicate.to_string());
        self
    }

    /// Emit every bucket, using the configured fill value for empty ones.
    pub fn fill_missing(mut self) -> Self {
        self.fill_missing = true;
        self
    }

    pub fn fill_missing_with(mut self, value: i64) -> Self {
        self.fill_missing = true;
        self.fill_value = value;
        self
    }

    pub fn with_previous(mut self, enabled: bool) -> Self {
        self.with_previous = enabled;
        self
    }

    pub fn project_when(mut self, target: f64) -> Self {
        self.project_when = Some(target);
        self
    }

    pub fn project_for_date(mut self, target: NaiveDateTime) -> Self {
        self.project_for_date = Some(target);
        self
    }

    pub fn projection_model(mut self, model: ProjectionModel) -> Self {
        self.projection_model = model;
        self
    }

    pub fn precision(mut self, places: u32) -> Self {
        self.precision = places;
        self
    }

    /// Pin the clock used to resolve relative ranges.
    pub fn at(mut self, now: NaiveDateTime) -> Self {
        self.now = Some(now);
        self
    }

    /// Apply `f` only when `condition` holds.
    pub fn when(self, condition: bool, f: impl FnOnce(Self) -> Self) -> Self {
        if condition {
            f(self)
        } else {
            self
        }
    }

    // -- terminals --

    /// Single aggregate over the range, with optional groups and previous
    /// period comparison.
    pub fn value(&self, executor: &dyn QueryExecutor) -> Result<ValueMetric> {
        self.validate()?;
        value::evaluate(self, executor)
    }

    /// Bucketed series over the range. With `in_percent`, bucket values
    /// become percentages of the total.
    pub fn trends(&self, executor: &dyn QueryExecutor, in_percent: bool) -> Result<TrendSeries> {
        self.validate()?;
        trend::evaluate(self, executor, in_percent)
    }

    /// The statement [`MetricQuery::value`] runs for the current range.
    pub fn value_sql(&self, dialect: Dialect) -> Result<String> {
        self.validate()?;
        let range = self.date_range()?;
        Ok(value::value_sql(self, dialect, &range, self.group_by.is_some()))
    }

    /// The statement [`MetricQuery::trends`] runs. Needs a bounded range,
    /// since `all()` discovers its start from the data.
    pub fn trends_sql(&self, dialect: Dialect) -> Result<String> {
        self.validate()?;
        let range = self.date_range()?;
        if range.from.is_none() {
            return Err(Error::InvalidDateRange(
                "trend SQL for all() depends on the earliest row; run trends() instead".into(),
            ));
        }
        Ok(trend::trends_sql(self, dialect, &range))
    }

    /// The range resolved against the query's clock.
    pub fn date_range(&self) -> Result<DateRange> {
        let now = self.now();
        match self.range {
            RangeSpec::Period(period) => DateRange::for_period(period, now),
            RangeSpec::Between(from, to) => Ok(DateRange::between(from, to)),
            RangeSpec::From(from) => Ok(DateRange::from(from, now)),
            RangeSpec::All => Ok(DateRange::all(now)),
            RangeSpec::Date(date) => Ok(DateRange::for_date(date)),
            RangeSpec::Minute(n) => DateRange::for_minute(n, now),
            RangeSpec::Hour(n) => DateRange::for_hour(n, now),
            RangeSpec::Day(n) => DateRange::for_day(n, now),
            RangeSpec::Week(n) => DateRange::for_week(n, now),
            RangeSpec::Month(n) => DateRange::for_month(n, now),
            RangeSpec::Year(n) => DateRange::for_year(n),
        }
    }

    pub(crate) fn now(&self) -> NaiveDateTime {
        self.now.unwrap_or_else(|| Local::now().naive_local())
    }

    fn validate(&self) -> Result<()> {
        if self.step == 0 {
            return Err(Error::InvalidArgument("interval step must be at least 1".into()));
        }
        if self.table.trim().is_empty() {
            return Err(Error::InvalidArgument("table name must not be empty".into()));
        }
        if self.precision > MAX_PRECISION {
            return Err(Error::InvalidArgument(format!(
                "precision {} exceeds {MAX_PRECISION} decimal places",
                self.precision
            )));
        }
        if let Ok(DateRange { from: Some(from), to }) = self.date_range() {
            if from > to {
                return Err(Error::InvalidDateRange(format!(
                    "range starts after it ends: {}",
                    DateRange::between(from, to).describe()
                )));
            }
        }
        Ok(())
    }

    // -- SQL fragments shared by the value and trend composers --

    /// Qualified date column.
    pub(crate) fn date_expr(&self) -> String {
        qualify(&self.table, &self.date_column)
    }

    /// Aggregate select expression, zero-filled when requested.
    pub(crate) fn metric_expr(&self) -> String {
        let fill = self.fill_missing.then_some(self.fill_value);
        select_expression(self.aggregate, &qualify(&self.table, &self.column), fill)
    }

    pub(crate) fn group_expr(&self) -> Option<String> {
        self.group_by.as_deref().map(group_expression)
    }

    /// Filters as ` AND (predicate)` clauses.
    pub(crate) fn filter_clause(&self) -> String {
        self.filters
            .iter()
            .map(|f| format!(" AND ({f})"))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::types::Number;
    use crate::storage::fixtures::{self, now, query, ts};

    #[test]
    fn test_default_range_is_previous_month() {
        let range = query().date_range().unwrap();
        assert_eq!(range.from, Some(ts("2025-03-01 00:00:00")));
        assert_eq!(range.to, ts("2025-03-31 23:59:59"));
    }

    #[test]
    fn test_at_may_come_after_range_setters() {
        let early = MetricQuery::new("test_data")
            .for_period(Period::Today)
            .at(now());
        assert_eq!(early.date_range().unwrap().from, Some(ts("2025-04-10")));
    }

    #[test]
    fn test_unit_resolvers() {
        let q = query();
        let day = q.clone().for_day(5).date_range().unwrap();
        assert_eq!(day.from, Some(ts("2025-04-05 00:00:00")));
        assert_eq!(day.to, ts("2025-04-05 23:59:59"));

        let week = q.clone().for_week(1).date_range().unwrap();
        assert_eq!(week.from, Some(ts("2024-12-30 00:00:00")));
        assert_eq!(week.to, ts("2025-01-05 23:59:59"));

        let month = q.clone().for_month(2).date_range().unwrap();
        assert_eq!(month.to, ts("2025-02-28 23:59:59"));

        let hour = q.clone().for_hour(13).date_range().unwrap();
        assert_eq!(hour.from, Some(ts("2025-04-10 13:00:00")));

        let year = q.for_year(2024).date_range().unwrap();
        assert_eq!(year.to, ts("2024-12-31 23:59:59"));
    }

    #[test]
    fn test_builder_is_copy_on_write() {
        let base = query().sum("value");
        let by_month = base.clone().by_month(1);
        assert_eq!(base.interval, IntervalUnit::Day);
        assert_eq!(by_month.interval, IntervalUnit::Month);
        assert_eq!(by_month.aggregate, AggregateKind::Sum);
    }

    #[test]
    fn test_when_applies_conditionally() {
        let q = query().when(true, |q| q.max("value")).when(false, |q| q.by_year(1));
        assert_eq!(q.aggregate, AggregateKind::Max);
        assert_eq!(q.interval, IntervalUnit::Day);
    }

    #[test]
    fn test_with_config() {
        let config = MetricsConfig {
            date_column: "updated_at".into(),
            precision: 2,
            fill_value: 7,
            ..Default::default()
        };
        let q = query().with_config(&config).fill_missing();
        assert_eq!(q.date_expr(), "test_data.updated_at");
        assert_eq!(q.metric_expr(), "COALESCE(NULLIF(COUNT(test_data.id), 0), 7)");
        assert_eq!(q.precision, 2);
    }

    #[test]
    fn test_zero_step_rejected() {
        let conn = fixtures::seeded();
        let err = query().by_day(0).trends(&conn, false).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_excess_precision_rejected() {
        let conn = fixtures::seeded();
        let err = query().precision(400).value(&conn).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert!(query().precision(MAX_PRECISION).value(&conn).is_ok());
    }

    #[test]
    fn test_inverted_range_rejected() {
        let conn = fixtures::seeded();
        let err = query()
            .between(ts("2025-04-10"), ts("2025-04-01"))
            .value(&conn)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidDateRange(_)));
    }

    #[test]
    fn test_value_sql_preview() {
        let sql = query()
            .sum("value")
            .filter("value > 100")
            .value_sql(Dialect::Postgres)
            .unwrap();
        assert_eq!(
            sql,
            "SELECT SUM(test_data.value) AS metric FROM test_data \
             WHERE test_data.created_at BETWEEN '2025-03-01 00:00:00' AND '2025-03-31 23:59:59' \
             AND (value > 100)"
        );
    }

    #[test]
    fn test_trends_sql_requires_bounded_range() {
        let err = query().all().trends_sql(Dialect::Sqlite).unwrap_err();
        assert!(matches!(err, Error::InvalidDateRange(_)));
        let sql = query().by_month(1).trends_sql(Dialect::Mysql).unwrap();
        assert!(sql.starts_with("WITH RECURSIVE date_series(dt)"));
        assert!(sql.contains("DATE_ADD(date_series.dt, INTERVAL 1 MONTH)"));
    }

    #[test]
    fn test_every_unit_resolver_runs() {
        let conn = fixtures::seeded();
        let q = query();
        // value ranges snap to the bucket interval, so narrow units need a
        // matching interval
        let minute = q.clone().by_minute(1).for_minute(38);
        assert_eq!(minute.value(&conn).unwrap().value, Number::Int(5));
        let hour = q.clone().by_hour(1).for_hour(2);
        assert_eq!(hour.value(&conn).unwrap().value, Number::Int(9));
        assert_eq!(
            q.clone().for_minute(38).value(&conn).unwrap().value,
            Number::Int(11)
        );
        assert_eq!(q.clone().for_day(9).value(&conn).unwrap().value, Number::Int(3));
        assert_eq!(q.clone().for_week(15).value(&conn).unwrap().value, Number::Int(16));
        assert_eq!(q.clone().for_month(1).value(&conn).unwrap().value, Number::Int(1));
        assert_eq!(q.for_year(2024).value(&conn).unwrap().value, Number::Int(3));
    }
}

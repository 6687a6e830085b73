use std::collections::BTreeMap;

use chrono::NaiveDateTime;

use crate::date_util::parse_timestamp;
use crate::error::Result;
use crate::metrics::aggregate::format_number;
use crate::metrics::projection::{self, Cadence};
use crate::metrics::types::{Number, TrendSeries};
use crate::metrics::value::{fetch_grouped, fetch_value, group_key};
use crate::query::builder::MetricQuery;
use crate::query::interval::IntervalUnit;
use crate::query::range::DateRange;
use crate::sql::{weekday_name, Dialect, DialectFormatter};
use crate::storage::{QueryExecutor, Row};

/// One row of the trend statement.
#[derive(Debug)]
struct Bucket {
    group: Option<String>,
    label: String,
    start: Option<NaiveDateTime>,
    /// Days after Sunday, for day-of-week series.
    weekday: Option<u32>,
    value: Number,
}

/// Evaluate the trends terminal.
pub(crate) fn evaluate(
    query: &MetricQuery,
    executor: &dyn QueryExecutor,
    in_percent: bool,
) -> Result<TrendSeries> {
    let mut range = query.date_range()?;
    if range.from.is_none() {
        let earliest = discover_start(query, executor)?;
        range = range.with_discovered_from(earliest.unwrap_or(range.to));
    }

    let dialect = executor.dialect();
    let sql = trends_sql(query, dialect, &range);
    log::debug!("Trend query ({}): {sql}", range.describe());
    let rows = executor.fetch(&sql)?;
    let mut buckets = rows
        .iter()
        .map(|row| read_bucket(query, dialect.formatter(), row))
        .collect::<Vec<_>>();
    if query.interval == IntervalUnit::DayOfWeek {
        // Sunday first, whatever the dialect's numbering
        buckets.sort_by_key(|b| (b.group.clone(), b.weekday));
    }

    // The total snaps to whole buckets, so edge weeks count in full.
    let interval = query.interval;
    let bucket_range = match range.floor(interval) {
        Some(floor) => DateRange::between(floor, range.ceil(interval)),
        None => range,
    };
    let cadence = Cadence {
        unit: interval,
        step: query.step,
    };

    let series = if query.group_by.is_some() {
        let totals = fetch_grouped(query, executor, &bucket_range)?;
        let mut partitions: BTreeMap<String, Vec<Bucket>> = BTreeMap::new();
        for bucket in buckets {
            let key = bucket.group.clone().unwrap_or_default();
            partitions.entry(key).or_default().push(bucket);
        }
        let groups = partitions
            .into_iter()
            .map(|(key, buckets)| {
                let total = totals.get(&key).copied().unwrap_or_default();
                let series = build_series(query, cadence, buckets, total, in_percent);
                (key, series)
            })
            .collect();
        TrendSeries {
            total: fetch_value(query, executor, &bucket_range)?,
            groups: Some(groups),
            ..Default::default()
        }
    } else {
        let total = fetch_value(query, executor, &bucket_range)?;
        build_series(query, cadence, buckets, total, in_percent)
    };

    Ok(series)
}

/// The recursive bucket statement for a bounded range.
///
/// `date_series` yields every bucket start from the floored `from` up to
/// the ceiled `to`; rows join a bucket on `[start, next start)`. Grouped
/// queries with gap filling cross every bucket with every group so empty
/// combinations still produce a row.
pub(crate) fn trends_sql(query: &MetricQuery, dialect: Dialect, range: &DateRange) -> String {
    let f = dialect.formatter();
    let unit = query.interval;
    let floor = range.floor(unit).unwrap_or(range.to);
    let ceil = f.literal(range.ceil(unit));
    let date = query.date_expr();
    let next = f.increment(unit, query.step, "date_series.dt");
    let filters = query.filter_clause();
    let group = query.group_expr();
    let cross_groups = query.fill_missing && group.is_some();

    let mut sql = format!(
        "WITH RECURSIVE date_series(dt) AS (SELECT {} AS dt {} SELECT {next} AS dt FROM date_series WHERE {next} <= {ceil})",
        f.seed(floor),
        f.union(),
    );
    if let (true, Some(group)) = (cross_groups, &group) {
        sql.push_str(&format!(
            ", metric_groups(grp) AS (SELECT DISTINCT {group} FROM {} WHERE {date} BETWEEN {} AND {ceil}{filters})",
            query.table,
            f.literal(floor),
        ));
    }

    let label = f.label(unit, "date_series.dt");
    let bucket = if unit == IntervalUnit::DayOfWeek {
        "MIN(date_series.dt)"
    } else {
        "date_series.dt"
    };
    sql.push_str(&format!(
        "\nSELECT {} AS metric, {label} AS label, {bucket} AS bucket",
        query.metric_expr()
    ));
    match (&group, cross_groups) {
        (Some(_), true) => sql.push_str(", metric_groups.grp AS grp"),
        (Some(group), false) => sql.push_str(&format!(", {group} AS grp")),
        (None, _) => {}
    }

    sql.push_str("\nFROM date_series");
    if cross_groups {
        sql.push_str(" CROSS JOIN metric_groups");
    }
    // The range bound sits in the join so a trailing bucket that runs past
    // `ceil` still yields its NULL row when filling.
    sql.push_str(&format!(
        "\nLEFT JOIN {} ON {date} >= date_series.dt AND {date} < {next} AND {date} BETWEEN {} AND {ceil}",
        query.table,
        f.literal(floor),
    ));
    if let (true, Some(group)) = (cross_groups, &group) {
        sql.push_str(&format!(" AND {group} = metric_groups.grp"));
    }
    sql.push_str(&filters);

    if !query.fill_missing {
        sql.push_str(&format!("\nWHERE {date} IS NOT NULL"));
    }

    let grouping = if group.is_some() { "grp, " } else { "" };
    if unit == IntervalUnit::DayOfWeek {
        sql.push_str(&format!("\nGROUP BY {grouping}label ORDER BY {grouping}label"));
    } else {
        sql.push_str(&format!(
            "\nGROUP BY {grouping}bucket, label ORDER BY {grouping}bucket"
        ));
    }
    sql
}

// ── Internal helpers ───────────────────────────────────────────────

/// `MIN(date)` over the filtered table, for ranges without a start.
fn discover_start(
    query: &MetricQuery,
    executor: &dyn QueryExecutor,
) -> Result<Option<NaiveDateTime>> {
    let mut sql = format!(
        "SELECT MIN({}) AS min_date FROM {}",
        query.date_expr(),
        query.table
    );
    if !query.filters.is_empty() {
        let predicates: Vec<String> = query.filters.iter().map(|p| format!("({p})")).collect();
        sql.push_str(" WHERE ");
        sql.push_str(&predicates.join(" AND "));
    }
    log::debug!("Discovering earliest row: {sql}");

    let rows = executor.fetch(&sql)?;
    let earliest = rows
        .first()
        .and_then(|row| row.get("min_date"))
        .and_then(|v| v.as_text());
    match earliest {
        Some(raw) => match parse_timestamp(&raw) {
            Ok(ts) => Ok(Some(ts)),
            Err(e) => {
                log::warn!("Ignoring unparseable earliest date '{raw}': {e}");
                Ok(None)
            }
        },
        None => Ok(None),
    }
}

fn read_bucket(query: &MetricQuery, formatter: &dyn DialectFormatter, row: &Row) -> Bucket {
    let raw_label = row.get("label").and_then(|v| v.as_text()).unwrap_or_default();
    let start = row
        .get("bucket")
        .and_then(|v| v.as_text())
        .and_then(|raw| match parse_timestamp(&raw) {
            Ok(ts) => Some(ts),
            Err(e) => {
                log::warn!("Unparseable bucket start '{raw}': {e}");
                None
            }
        });

    let (label, weekday) = if query.interval == IntervalUnit::DayOfWeek {
        let weekday = row
            .get("label")
            .and_then(|v| v.as_i64())
            .and_then(|index| formatter.weekday_from_sunday(index));
        match weekday.and_then(weekday_name) {
            Some(name) => (name.to_string(), weekday),
            None => (raw_label, None),
        }
    } else {
        (raw_label, None)
    };

    Bucket {
        group: query.group_by.as_ref().map(|_| group_key(row.get("grp"))),
        label,
        start,
        weekday,
        value: row
            .get("metric")
            .map(|v| format_number(v, query.precision))
            .unwrap_or_default(),
    }
}

fn build_series(
    query: &MetricQuery,
    cadence: Cadence,
    buckets: Vec<Bucket>,
    total: Number,
    in_percent: bool,
) -> TrendSeries {
    let starts: Option<Vec<NaiveDateTime>> = buckets.iter().map(|b| b.start).collect();
    let mut series = TrendSeries {
        labels: buckets.iter().map(|b| b.label.clone()).collect(),
        data: buckets.iter().map(|b| b.value).collect(),
        total,
        buckets: starts.unwrap_or_default(),
        ..Default::default()
    };

    // Projections extrapolate absolute values, so they run before any
    // percent conversion.
    series.projections = projection::project(
        &series,
        cadence,
        query.project_when,
        query.project_for_date,
        query.projection_model,
        query.precision,
    );

    if in_percent {
        let total = total.as_f64();
        series.data = series
            .data
            .iter()
            .map(|v| {
                if total == 0.0 {
                    Number::Int(0)
                } else {
                    Number::rounded(v.as_f64() / total * 100.0, 2)
                }
            })
            .collect();
    }
    series
}

use std::collections::BTreeMap;

use crate::error::Result;
use crate::metrics::aggregate::format_number;
use crate::metrics::types::{Number, PreviousKind, PreviousValue, ValueMetric};
use crate::query::builder::MetricQuery;
use crate::query::range::DateRange;
use crate::sql::Dialect;
use crate::storage::{QueryExecutor, SqlValue};

/// Evaluate the value terminal: the ungrouped aggregate, per-group values
/// when grouped, and the previous-period comparison when requested.
pub(crate) fn evaluate(query: &MetricQuery, executor: &dyn QueryExecutor) -> Result<ValueMetric> {
    let range = query.date_range()?;
    // Resolve before touching the database so all() fails fast.
    let previous_range = if query.with_previous {
        Some(range.previous()?)
    } else {
        None
    };

    let value = fetch_value(query, executor, &range)?;
    let groups = match query.group_by {
        Some(_) => Some(fetch_grouped(query, executor, &range)?),
        None => None,
    };
    let previous = match previous_range {
        Some(previous_range) => {
            log::debug!("Previous period {}", previous_range.describe());
            let previous = fetch_value(query, executor, &previous_range)?;
            Some(compare(value, previous, query.precision))
        }
        None => None,
    };

    Ok(ValueMetric {
        value,
        previous,
        groups,
    })
}

/// `SELECT metric [, grp] FROM table WHERE date BETWEEN floor AND ceil`.
///
/// The range snaps outward to whole buckets of the query interval; an open
/// lower bound becomes `date <= ceil`.
pub(crate) fn value_sql(
    query: &MetricQuery,
    dialect: Dialect,
    range: &DateRange,
    grouped: bool,
) -> String {
    let formatter = dialect.formatter();
    let date = query.date_expr();
    let ceil = formatter.literal(range.ceil(query.interval));
    let group = if grouped { query.group_expr() } else { None };

    let mut sql = format!("SELECT {} AS metric", query.metric_expr());
    if let Some(ref group) = group {
        sql.push_str(&format!(", {group} AS grp"));
    }
    sql.push_str(&format!(" FROM {}", query.table));
    match range.floor(query.interval) {
        Some(floor) => sql.push_str(&format!(
            " WHERE {date} BETWEEN {} AND {ceil}",
            formatter.literal(floor)
        )),
        None => sql.push_str(&format!(" WHERE {date} <= {ceil}")),
    }
    sql.push_str(&query.filter_clause());
    if group.is_some() {
        sql.push_str(" GROUP BY grp ORDER BY grp");
    }
    sql
}

/// Ungrouped aggregate over `range`. No rows reads as zero.
pub(crate) fn fetch_value(
    query: &MetricQuery,
    executor: &dyn QueryExecutor,
    range: &DateRange,
) -> Result<Number> {
    let sql = value_sql(query, executor.dialect(), range, false);
    log::debug!("Value query: {sql}");
    let rows = executor.fetch(&sql)?;
    Ok(rows
        .first()
        .and_then(|row| row.get("metric"))
        .map(|v| format_number(v, query.precision))
        .unwrap_or_default())
}

/// Aggregate per group key over `range`.
pub(crate) fn fetch_grouped(
    query: &MetricQuery,
    executor: &dyn QueryExecutor,
    range: &DateRange,
) -> Result<BTreeMap<String, Number>> {
    let sql = value_sql(query, executor.dialect(), range, true);
    log::debug!("Grouped value query: {sql}");
    let rows = executor.fetch(&sql)?;
    Ok(rows
        .iter()
        .map(|row| {
            let key = group_key(row.get("grp"));
            let value = row
                .get("metric")
                .map(|v| format_number(v, query.precision))
                .unwrap_or_default();
            (key, value)
        })
        .collect())
}

/// Group keys as text; NULL groups collect under an empty key.
pub(crate) fn group_key(value: Option<&SqlValue>) -> String {
    value.and_then(SqlValue::as_text).unwrap_or_default()
}

/// Classify `current` against `previous`.
///
/// The percentage is relative to `previous`; a change away from zero
/// counts as 100%.
pub fn compare(current: Number, previous: Number, precision: u32) -> PreviousValue {
    let (cur, prev) = (current.as_f64(), previous.as_f64());
    let difference = cur - prev;

    if difference == 0.0 {
        return PreviousValue {
            kind: PreviousKind::Identical,
            value: previous,
            difference: Number::Int(0),
            percentage: Number::Int(0),
        };
    }

    let kind = if difference > 0.0 {
        PreviousKind::Increase
    } else {
        PreviousKind::Decrease
    };
    let percentage = if prev == 0.0 {
        100.0
    } else {
        (difference / prev * 100.0).abs()
    };

    PreviousValue {
        kind,
        value: previous,
        difference: Number::rounded(difference.abs(), precision),
        percentage: Number::rounded(percentage, 2),
    }
}

use std::sync::LazyLock;

use regex::Regex;

use crate::metrics::types::Number;
use crate::query::interval::AggregateKind;
use crate::storage::SqlValue;

static RE_IDENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());
static RE_ALIAS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s+as\s+[A-Za-z_][A-Za-z0-9_]*\s*$").unwrap());

/// Prefix a bare column name with its table. Expressions pass through.
pub fn qualify(table: &str, column: &str) -> String {
    let column = column.trim();
    if RE_IDENT.is_match(column) {
        format!("{table}.{column}")
    } else {
        column.to_string()
    }
}

/// `COUNT(col)`, or `COALESCE(NULLIF(COUNT(col), 0), fill)` when filling.
///
/// A genuine zero and "no rows" both become `fill`.
pub fn select_expression(kind: AggregateKind, column: &str, fill: Option<i64>) -> String {
    let aggregate = format!("{}({column})", kind.sql_function());
    match fill {
        Some(fill) => format!("COALESCE(NULLIF({aggregate}, 0), {fill})"),
        None => aggregate,
    }
}

/// Drop a trailing `AS alias` so the expression can be re-aliased as `grp`.
pub fn group_expression(raw: &str) -> String {
    RE_ALIAS.replace(raw.trim(), "").trim().to_string()
}

/// Render an aggregate cell. NULL (no rows) reads as zero.
pub fn format_number(value: &SqlValue, precision: u32) -> Number {
    match value {
        SqlValue::Null => Number::Int(0),
        SqlValue::Integer(v) => Number::Int(*v),
        SqlValue::Real(v) => Number::rounded(*v, precision),
        SqlValue::Text(s) => match s.trim().parse::<f64>() {
            Ok(v) => Number::rounded(v, precision),
            Err(_) => {
                log::warn!("Non-numeric aggregate value '{s}', treating as 0");
                Number::Int(0)
            }
        },
    }
}

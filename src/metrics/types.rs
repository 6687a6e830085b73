use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDateTime;
use serde::Serialize;

/// A metric value: integral results stay integers, everything else is a
/// float rounded to the query's precision.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    /// Integer when `value` has no fractional part after rounding to
    /// `precision` decimal places.
    pub fn rounded(value: f64, precision: u32) -> Self {
        if !value.is_finite() {
            return Number::Float(value);
        }
        let factor = 10f64.powi(precision as i32);
        let rounded = if value.fract() == 0.0 {
            value
        } else {
            (value * factor).round() / factor
        };
        if rounded.fract() == 0.0 && rounded.abs() < 9.0e15 {
            Number::Int(rounded as i64)
        } else {
            Number::Float(rounded)
        }
    }

    pub fn as_f64(&self) -> f64 {
        match self {
            Number::Int(v) => *v as f64,
            Number::Float(v) => *v,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.as_f64() == 0.0
    }
}

impl Default for Number {
    fn default() -> Self {
        Number::Int(0)
    }
}

impl From<i64> for Number {
    fn from(v: i64) -> Self {
        Number::Int(v)
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(v) => write!(f, "{v}"),
            Number::Float(v) => write!(f, "{v}"),
        }
    }
}

/// Ordered, labelled series produced by a trend query.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrendSeries {
    pub labels: Vec<String>,
    pub data: Vec<Number>,
    pub total: Number,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub groups: Option<BTreeMap<String, TrendSeries>>,
    #[serde(skip_serializing_if = "Projections::is_empty")]
    pub projections: Projections,
    /// Start of each bucket, parallel to `labels`.
    #[serde(skip)]
    pub buckets: Vec<NaiveDateTime>,
}

impl TrendSeries {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Series for one group key, if this is a grouped result.
    pub fn group(&self, key: &str) -> Option<&TrendSeries> {
        self.groups.as_ref().and_then(|g| g.get(key))
    }

    /// Value of the bucket labelled `label`.
    pub fn get(&self, label: &str) -> Option<Number> {
        self.labels
            .iter()
            .position(|l| l == label)
            .map(|i| self.data[i])
    }

    /// Label/value pairs in bucket order.
    pub fn assoc(&self) -> Vec<(String, Number)> {
        self.labels
            .iter()
            .cloned()
            .zip(self.data.iter().copied())
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PreviousKind {
    Increase,
    Decrease,
    Identical,
}

/// Comparison against the abutting previous range.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreviousValue {
    #[serde(rename = "type")]
    pub kind: PreviousKind,
    pub value: Number,
    pub difference: Number,
    pub percentage: Number,
}

/// Single aggregate over the whole range.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValueMetric {
    pub value: Number,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous: Option<PreviousValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub groups: Option<BTreeMap<String, Number>>,
}

impl ValueMetric {
    pub fn group(&self, key: &str) -> Option<Number> {
        self.groups.as_ref().and_then(|g| g.get(key).copied())
    }
}

/// "When will the cumulative total reach `target_value`?"
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WhenProjection {
    pub target_value: f64,
    pub projected_date: Option<NaiveDateTime>,
    pub confidence: u8,
}

/// "What will the cumulative total be at `target_date`?"
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DateProjection {
    pub target_date: NaiveDateTime,
    pub projected_total: Option<Number>,
    pub confidence: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Projections {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub when: Option<WhenProjection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<DateProjection>,
}

impl Projections {
    pub fn is_empty(&self) -> bool {
        self.when.is_none() && self.date.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rounded_keeps_integers() {
        assert_eq!(Number::rounded(70.0, 4), Number::Int(70));
        assert_eq!(Number::rounded(-3.0, 4), Number::Int(-3));
    }

    #[test]
    fn test_rounded_to_precision() {
        assert_eq!(Number::rounded(2521.765431, 4), Number::Float(2521.7654));
        assert_eq!(Number::rounded(33.333333, 2), Number::Float(33.33));
        assert_eq!(Number::rounded(1.99999, 2), Number::Int(2));
    }

    #[test]
    fn test_series_lookup_helpers() {
        let series = TrendSeries {
            labels: vec!["2025-03-10".into(), "2025-03-20".into()],
            data: vec![Number::Int(1), Number::Int(2)],
            total: Number::Int(3),
            ..Default::default()
        };
        assert_eq!(series.get("2025-03-20"), Some(Number::Int(2)));
        assert_eq!(series.get("2025-03-21"), None);
        assert_eq!(series.assoc()[0], ("2025-03-10".to_string(), Number::Int(1)));
        assert_eq!(series.len(), 2);
    }

    #[test]
    fn test_serialize_shape() {
        let series = TrendSeries {
            labels: vec!["2025".into()],
            data: vec![Number::Float(1.5)],
            total: Number::Int(2),
            ..Default::default()
        };
        let json = serde_json::to_value(&series).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"labels": ["2025"], "data": [1.5], "total": 2})
        );
    }

    #[test]
    fn test_previous_serializes_type_key() {
        let metric = ValueMetric {
            value: Number::Int(0),
            previous: Some(PreviousValue {
                kind: PreviousKind::Decrease,
                value: Number::Int(115),
                difference: Number::Int(115),
                percentage: Number::Int(100),
            }),
            groups: None,
        };
        let json = serde_json::to_value(&metric).unwrap();
        assert_eq!(json["previous"]["type"], "decrease");
        assert_eq!(json["previous"]["percentage"], 100);
    }
}

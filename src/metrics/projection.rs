use std::collections::HashMap;

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::date_util::{add_units, units_between};
use crate::metrics::types::{DateProjection, Number, Projections, TrendSeries, WhenProjection};
use crate::query::interval::IntervalUnit;

/// How future growth is extrapolated from a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectionModel {
    /// Weighted mean of successive differences, later changes weighing more.
    #[default]
    WeightedRate,
    /// Mean per-bucket value, decaying over the projection horizon.
    DecayedAverage,
}

impl ProjectionModel {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "weighted_rate" | "weighted" => Some(ProjectionModel::WeightedRate),
            "decayed_average" | "decayed" => Some(ProjectionModel::DecayedAverage),
            _ => None,
        }
    }
}

/// Bucket geometry of the series being projected.
#[derive(Debug, Clone, Copy)]
pub struct Cadence {
    pub unit: IntervalUnit,
    pub step: u32,
}

impl Cadence {
    fn advance(&self, ts: NaiveDateTime, buckets: i64) -> Option<NaiveDateTime> {
        add_units(ts, self.unit, buckets.checked_mul(self.step as i64)?).ok()
    }

    /// Whole buckets from `from` to `to`, never negative.
    fn buckets_between(&self, from: NaiveDateTime, to: NaiveDateTime) -> f64 {
        let units = units_between(from, to, self.unit).max(0);
        (units / self.step.max(1) as i64) as f64
    }
}

/// Per-bucket values from the first to the last bucket, with 0 for any
/// bucket the series omitted.
pub fn normalize(series: &TrendSeries, cadence: Cadence) -> Vec<f64> {
    let values: Vec<f64> = series.data.iter().map(Number::as_f64).collect();
    if cadence.unit == IntervalUnit::DayOfWeek || series.buckets.len() != values.len() {
        return values;
    }
    let (Some(first), Some(last)) = (series.buckets.first(), series.buckets.last()) else {
        return values;
    };

    let by_bucket: HashMap<NaiveDateTime, f64> =
        series.buckets.iter().copied().zip(values.iter().copied()).collect();
    let mut normalized = Vec::with_capacity(values.len());
    let mut cursor = *first;
    let mut index = 0;
    while cursor <= *last {
        normalized.push(by_bucket.get(&cursor).copied().unwrap_or(0.0));
        index += 1;
        match cadence.advance(*first, index) {
            Some(next) => cursor = next,
            None => break,
        }
    }
    normalized
}

/// `round(100 * (0.4 * min(n/10, 1) + 0.6 * consistency))`, where
/// consistency is `min(1, 1/(1 + |sd/mean|))` over successive differences.
pub fn confidence(values: &[f64]) -> u8 {
    if values.len() < 2 {
        return 0;
    }
    let data_points = (values.len() as f64 / 10.0).min(1.0);

    let changes: Vec<f64> = values.windows(2).map(|w| w[1] - w[0]).collect();
    let mean = changes.iter().sum::<f64>() / changes.len() as f64;
    let variance =
        changes.iter().map(|c| (c - mean).powi(2)).sum::<f64>() / changes.len() as f64;
    let std_dev = variance.sqrt();

    let consistency = if mean != 0.0 {
        (1.0 / (1.0 + (std_dev / mean).abs())).min(1.0)
    } else {
        0.0
    };

    (100.0 * (0.4 * data_points + 0.6 * consistency))
        .round()
        .clamp(0.0, 100.0) as u8
}

/// Weighted mean of successive differences with weights 1, 2, 3, …,
/// clamped at zero.
pub fn weighted_rate(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let (weighted, weights) = values
        .windows(2)
        .enumerate()
        .fold((0.0, 0.0), |(sum, total), (i, w)| {
            let weight = (i + 1) as f64;
            (sum + weight * (w[1] - w[0]), total + weight)
        });
    (weighted / weights).max(0.0)
}

/// Date at which the cumulative total reaches `target`.
pub fn project_when(
    series: &TrendSeries,
    cadence: Cadence,
    target: f64,
    model: ProjectionModel,
) -> WhenProjection {
    let infeasible = |confidence| WhenProjection {
        target_value: target,
        projected_date: None,
        confidence,
    };

    let values = normalize(series, cadence);
    let Some(last) = series.buckets.last().copied() else {
        return infeasible(0);
    };
    if values.len() < 2 {
        return infeasible(0);
    }

    let current: f64 = values.iter().sum();
    let confidence = confidence(&values);

    let projected_date = match model {
        ProjectionModel::WeightedRate => {
            let rate = weighted_rate(&values);
            log::trace!("weighted rate {rate} from {} buckets, current {current}", values.len());
            if rate <= 0.0 || target <= current {
                return infeasible(confidence);
            }
            let intervals = (target - current) / rate;
            let whole = intervals.floor();
            let partial = intervals - whole;
            cadence.advance(last, whole as i64).map(|date| {
                let seconds =
                    partial * cadence.step as f64 * cadence.unit.approx_seconds() as f64;
                date + Duration::seconds(seconds as i64)
            })
        }
        ProjectionModel::DecayedAverage => {
            if current >= target {
                return infeasible(100);
            }
            let average = current / values.len() as f64;
            if average <= 0.0 {
                return infeasible(confidence);
            }
            let intervals = ((target - current) / average).ceil();
            cadence.advance(last, intervals as i64)
        }
    };

    match projected_date {
        Some(date) => WhenProjection {
            target_value: target,
            projected_date: Some(date),
            confidence,
        },
        None => infeasible(confidence),
    }
}

/// Cumulative total expected at `target_date`.
pub fn project_for_date(
    series: &TrendSeries,
    cadence: Cadence,
    target_date: NaiveDateTime,
    model: ProjectionModel,
    precision: u32,
) -> DateProjection {
    let infeasible = |confidence| DateProjection {
        target_date,
        projected_total: None,
        confidence,
    };

    let values = normalize(series, cadence);
    let Some(last) = series.buckets.last().copied() else {
        return infeasible(0);
    };
    if values.len() < 2 {
        return infeasible(0);
    }

    let current: f64 = values.iter().sum();
    let confidence = confidence(&values);
    let horizon = cadence.buckets_between(last, target_date);

    let total = match model {
        ProjectionModel::WeightedRate => {
            let rate = weighted_rate(&values);
            if rate <= 0.0 {
                return infeasible(confidence);
            }
            Number::rounded(current + rate * horizon, precision)
        }
        ProjectionModel::DecayedAverage => {
            let average = current / values.len() as f64;
            let increment: f64 = (1..=horizon as i64)
                .map(|i| (average / (1.0 + i as f64 / 30.0)).max(0.1))
                .sum();
            Number::rounded((current + increment).round(), precision)
        }
    };

    DateProjection {
        target_date,
        projected_total: Some(total),
        confidence,
    }
}

/// Projections requested for a series, if any.
pub fn project(
    series: &TrendSeries,
    cadence: Cadence,
    target_value: Option<f64>,
    target_date: Option<NaiveDateTime>,
    model: ProjectionModel,
    precision: u32,
) -> Projections {
    Projections {
        when: target_value.map(|t| project_when(series, cadence, t, model)),
        date: target_date.map(|d| project_for_date(series, cadence, d, model, precision)),
    }
}

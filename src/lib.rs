//! Time-bucketed aggregate metrics over SQL tables.
//!
//! A [`MetricQuery`] describes an aggregate (`count`, `sum`, `average`,
//! `min`, `max`) over a date range. Its terminals produce a single
//! [`ValueMetric`], optionally compared with the preceding period, or a
//! gap-aware [`TrendSeries`] bucketed by an [`IntervalUnit`] and optionally
//! extrapolated by the projection engine. Bucket generation runs inside the
//! database as a recursive CTE rendered for SQLite, PostgreSQL or MySQL.

pub mod config;
pub mod date_util;
pub mod error;
pub mod metrics;
pub mod query;
pub mod sql;
pub mod storage;

pub use config::MetricsConfig;
pub use error::{Error, Result};
pub use metrics::{
    DateProjection, Number, PreviousKind, PreviousValue, ProjectionModel, Projections,
    TrendSeries, ValueMetric, WhenProjection,
};
pub use query::builder::MetricQuery;
pub use query::interval::{AggregateKind, IntervalUnit};
pub use query::period::Period;
pub use query::range::DateRange;
pub use sql::Dialect;
pub use storage::{Database, QueryExecutor, Row, SqlValue};

//! Metric evaluation
//!
//! [`crate::MetricQuery`] terminals dispatch here: [`value`] for single
//! aggregates and previous-period comparison, [`trend`] for bucketed
//! series, and [`projection`] for extrapolating a finished series.

pub mod aggregate;
pub mod projection;
pub mod trend;
pub mod types;
pub mod value;

pub use projection::ProjectionModel;
pub use types::*;

//! Transformation module.
//!
//! This module turns loaded tables into insight data:
//! - Normalize: canonical column names
//! - Join / Aggregate: inner and left joins, group-by, top-N
//! - Metrics: delivery delay, order success, per-order totals, correlation
//! - Capability: availability checks for optional columns
//! - Pipeline: the analyses, run against the table cache

pub mod aggregate;
pub mod capability;
pub mod join;
pub mod metrics;
pub mod normalize;
pub mod pipeline;

pub use aggregate::{
    aggregate, group_by, histogram, top_n, Aggregation, HistogramBin, RankedGroup, Reducer,
};
pub use capability::{first_present, require, Availability};
pub use join::{join, JoinKind, JoinOutcome, JoinSpec};
pub use metrics::*;
pub use normalize::{normalize, normalize_column_name};
pub use pipeline::*;

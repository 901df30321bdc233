//! Analytics core of the student early warning dashboard.
//!
//! Raw backend payloads go through [`normalize`] once, at the boundary. The
//! resulting [`models::StudentRecord`]s feed the pure aggregation stages:
//! [`stats`] for grouped distributions and [`histogram`] for binned counts.
//! [`dashboard`] and [`report`] shape those results for presentation.

pub mod config;
pub mod dashboard;
pub mod error;
pub mod histogram;
pub mod models;
pub mod normalize;
pub mod report;
pub mod risk;
pub mod sources;
pub mod stats;

pub use error::{AnalyticsError, AnalyticsResult, RecordError};
pub use histogram::compute_histogram;
pub use normalize::{normalize_batch, normalize_record, Mode, NormalizedBatch};
pub use stats::{compute_distribution, compute_single};

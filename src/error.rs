//! Typed failures raised by the normalizer and the aggregation functions.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalyticsError {
    #[error("missing required field `{field}`")]
    MissingField { field: String },

    #[error("unrecognized value {value:?} for `{field}`")]
    UnknownEnumValue { field: String, value: String },

    #[error("field `{field}` must be a {expected}")]
    InvalidType {
        field: String,
        expected: &'static str,
    },

    #[error("`{field}` = {value} is outside [{min}, {max}]")]
    OutOfRange {
        field: String,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("duplicate student id {id:?}")]
    DuplicateId { id: String },

    #[error("cannot build a histogram of {what}: no values")]
    EmptyInput { what: String },

    #[error("invalid histogram range: min {min} must be below max {max}")]
    InvalidRange { min: f64, max: f64 },

    #[error("histogram needs at least one bin")]
    InvalidBinCount,
}

impl AnalyticsError {
    pub fn missing(field: impl Into<String>) -> Self {
        AnalyticsError::MissingField {
            field: field.into(),
        }
    }

    pub fn unknown(field: impl Into<String>, value: impl Into<String>) -> Self {
        AnalyticsError::UnknownEnumValue {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn invalid_type(field: impl Into<String>, expected: &'static str) -> Self {
        AnalyticsError::InvalidType {
            field: field.into(),
            expected,
        }
    }
}

/// A raw record that failed normalization, with enough context to find it.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("record #{index}{}: {source}", id_suffix(.id))]
pub struct RecordError {
    pub index: usize,
    pub id: Option<String>,
    #[source]
    pub source: AnalyticsError,
}

fn id_suffix(id: &Option<String>) -> String {
    match id {
        Some(id) => format!(" (id {id})"),
        None => String::new(),
    }
}

pub type AnalyticsResult<T> = Result<T, AnalyticsError>;

//! Error taxonomy for loading and scoring

use chrono::NaiveDateTime;

/// Bad or missing input data. Indicates caller misuse, never transient.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("no transactions to score")]
    EmptyInput,

    #[error("row {row}: missing required field '{field}'")]
    MissingField { row: usize, field: &'static str },

    #[error("column '{column}' not found in input (available: {available})")]
    MissingColumn { column: String, available: String },

    #[error("column '{column}' is mapped to both {first} and {second}")]
    DuplicateMapping {
        column: String,
        first: &'static str,
        second: &'static str,
    },

    #[error("row {row}: order value {value} must be a non-negative number")]
    InvalidOrderValue { row: usize, value: f64 },

    #[error("row {row}: transaction date {date} is after reference date {reference}")]
    FutureTransaction {
        row: usize,
        date: NaiveDateTime,
        reference: NaiveDateTime,
    },
}

/// Degenerate or out-of-range scoring configuration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("all weights are zero, weighting is undefined")]
    ZeroWeights,

    #[error("{dimension} weight {value} is outside 0..=10")]
    WeightOutOfRange { dimension: &'static str, value: u8 },

    #[error("bin count {0} is outside 2..=10")]
    InvalidBinCount(u8),
}

/// Crate-level error returned by the library entry points.
#[derive(Debug, thiserror::Error)]
pub enum RfmError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("failed to read input: {0}")]
    Polars(#[from] polars::prelude::PolarsError),
}

impl RfmError {
    /// Returns the validation error, if this is one.
    pub fn as_validation(&self) -> Option<&ValidationError> {
        match self {
            Self::Validation(e) => Some(e),
            _ => None,
        }
    }

    /// Returns the configuration error, if this is one.
    pub fn as_configuration(&self) -> Option<&ConfigurationError> {
        match self {
            Self::Configuration(e) => Some(e),
            _ => None,
        }
    }
}

//! Error types for the quality engine.
//!
//! Only structural problems are errors. A reading that parses but looks
//! wrong (missing fields, out-of-range values, anomalies, inconsistencies)
//! is scored, never rejected.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// A reading that cannot be scored because it is structurally invalid.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MalformedReadingError {
    /// City identifier is empty or whitespace.
    #[error("Malformed reading: city identifier is empty")]
    EmptyCity,

    /// Timestamp string is not RFC 3339.
    #[error("Malformed reading: unparseable timestamp {value:?}: {reason}")]
    UnparseableTimestamp { value: String, reason: String },

    /// A numeric field holds NaN or an infinity.
    #[error("Malformed reading: {field} is not a finite number")]
    NonFiniteValue { field: &'static str },

    /// Timestamp lies further in the future than the clock-skew tolerance.
    #[error(
        "Malformed reading: timestamp {timestamp} is ahead of {now} by more than {tolerance_minutes} minutes"
    )]
    FutureTimestamp {
        timestamp: DateTime<Utc>,
        now: DateTime<Utc>,
        tolerance_minutes: i64,
    },
}

/// An engine configuration that is rejected at construction time.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("Configuration error: dimension weights sum to {sum}, expected 1.0")]
    WeightsDoNotSumToOne { sum: f64 },

    #[error("Configuration error: weight {name} is negative ({value})")]
    NegativeWeight { name: &'static str, value: f64 },

    #[error("Configuration error: {name} has invalid value {value}")]
    InvalidThreshold { name: &'static str, value: f64 },

    #[error("Configuration error: bounds for {field} are invalid (min {min}, max {max})")]
    InvalidBounds { field: &'static str, min: f64, max: f64 },

    #[error(
        "Configuration error: history window of {window} cannot hold the {min_samples} samples anomaly scoring needs"
    )]
    WindowTooSmall { window: usize, min_samples: usize },
}

/// Errors surfaced by the engine entry points.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QualityError {
    #[error(transparent)]
    Malformed(#[from] MalformedReadingError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

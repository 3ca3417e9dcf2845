//! Per-reading quality checks.
//!
//! Each checker turns a [`Reading`](crate::reading::Reading) into a list of
//! [`FieldCheckResult`]s. Checkers never fail and never mutate the reading;
//! only the anomaly detector keeps state.

pub mod anomaly;
pub mod consistency;
pub mod freshness;
pub mod range;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::reading::Field;

/// Which checker produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    Completeness,
    Range,
    Anomaly,
    Consistency,
    Ordering,
}

/// Weight tier of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Hard,
    Soft,
}

/// Why a check did not pass (or, for `InsufficientHistory`, did not run).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reason {
    Missing,
    OutOfRange,
    Anomalous,
    InsufficientHistory,
    DewPointExceedsTemperature,
    ConditionTemperatureMismatch,
    SuspiciousClearHighHumidity,
    SuspiciousTemperatureHumidity,
    ImplausibleRateOfChange,
    OutOfOrderTimestamp,
}

impl Reason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Reason::Missing => "missing",
            Reason::OutOfRange => "out_of_range",
            Reason::Anomalous => "anomalous",
            Reason::InsufficientHistory => "insufficient_history",
            Reason::DewPointExceedsTemperature => "dew_point_exceeds_temperature",
            Reason::ConditionTemperatureMismatch => "condition_temperature_mismatch",
            Reason::SuspiciousClearHighHumidity => "suspicious_clear_high_humidity",
            Reason::SuspiciousTemperatureHumidity => "suspicious_temperature_humidity",
            Reason::ImplausibleRateOfChange => "implausible_rate_of_change",
            Reason::OutOfOrderTimestamp => "out_of_order_timestamp",
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one check on one field.
///
/// `passed` is meaningless for [`Reason::InsufficientHistory`] entries; the
/// aggregator skips them entirely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldCheckResult {
    pub field: Field,
    pub kind: CheckKind,
    pub passed: bool,
    pub severity: Option<Severity>,
    pub reason: Option<Reason>,
    pub detail: Option<String>,
}

impl FieldCheckResult {
    pub fn pass(field: Field, kind: CheckKind) -> Self {
        Self {
            field,
            kind,
            passed: true,
            severity: None,
            reason: None,
            detail: None,
        }
    }

    pub fn fail(field: Field, kind: CheckKind, severity: Severity, reason: Reason) -> Self {
        Self {
            field,
            kind,
            passed: false,
            severity: Some(severity),
            reason: Some(reason),
            detail: None,
        }
    }

    /// A result with a reason but no severity: missing values and skipped checks.
    pub fn unscored(field: Field, kind: CheckKind, reason: Reason) -> Self {
        Self {
            field,
            kind,
            passed: false,
            severity: None,
            reason: Some(reason),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn is_skipped(&self) -> bool {
        self.reason == Some(Reason::InsufficientHistory)
    }

    /// A real failure, as opposed to a pass or a skipped check.
    pub fn is_failure(&self) -> bool {
        !self.passed && !self.is_skipped()
    }
}

impl fmt::Display for FieldCheckResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.passed, self.reason) {
            (true, _) => write!(f, "{}: ok", self.field),
            (false, Some(reason)) => {
                write!(f, "{}: {}", self.field, reason)?;
                if let Some(detail) = &self.detail {
                    write!(f, " ({})", detail)?;
                }
                Ok(())
            }
            (false, None) => write!(f, "{}: failed", self.field),
        }
    }
}

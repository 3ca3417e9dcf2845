//! Reading recency and per-city timestamp ordering.
//!
//! # Clock injection
//! Every function takes `now` explicitly rather than calling `Utc::now()`,
//! which keeps freshness deterministic in tests.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::checks::{CheckKind, FieldCheckResult, Reason, Severity};
use crate::config::QualityConfig;
use crate::reading::{Field, Reading};

/// Freshness score plus the ordering check, if one could be made.
#[derive(Debug, Clone, PartialEq)]
pub struct FreshnessOutcome {
    pub score: f64,
    pub delay_minutes: f64,
    pub ordering: Option<FieldCheckResult>,
}

/// Maps reading delay to a score in `[0, 1]`.
///
/// | Delay                    | Score                 |
/// |--------------------------|-----------------------|
/// | `<= fresh`               | 1.0                   |
/// | between fresh and stale  | linear from 1.0 to 0.0 |
/// | `>= stale`               | 0.0                   |
#[derive(Debug, Clone, Copy)]
pub struct FreshnessEvaluator {
    fresh_minutes: f64,
    stale_minutes: f64,
}

impl FreshnessEvaluator {
    pub fn new(fresh_minutes: f64, stale_minutes: f64) -> Self {
        Self {
            fresh_minutes,
            stale_minutes,
        }
    }

    pub fn from_config(config: &QualityConfig) -> Self {
        Self::new(config.freshness_fresh_minutes, config.freshness_stale_minutes)
    }

    /// Score for a reading that is `delay_minutes` old. Negative delays
    /// (clock skew) count as perfectly fresh.
    pub fn score_delay(&self, delay_minutes: f64) -> f64 {
        if delay_minutes <= self.fresh_minutes {
            1.0
        } else if delay_minutes >= self.stale_minutes {
            0.0
        } else {
            let span = self.stale_minutes - self.fresh_minutes;
            (1.0 - (delay_minutes - self.fresh_minutes) / span).clamp(0.0, 1.0)
        }
    }

    /// Flags a reading older than the newest one already seen for its city.
    ///
    /// Returns `None` when the city has no prior reading.
    pub fn check_order(
        &self,
        reading: &Reading,
        latest_seen: Option<DateTime<Utc>>,
    ) -> Option<FieldCheckResult> {
        let latest = latest_seen?;
        Some(if reading.timestamp() < latest {
            debug!(city = reading.city(), timestamp = %reading.timestamp(), latest = %latest, "Out-of-order timestamp");
            FieldCheckResult::fail(
                Field::Timestamp,
                CheckKind::Ordering,
                Severity::Hard,
                Reason::OutOfOrderTimestamp,
            )
            .with_detail(format!("{} precedes {}", reading.timestamp(), latest))
        } else {
            FieldCheckResult::pass(Field::Timestamp, CheckKind::Ordering)
        })
    }

    pub fn evaluate(
        &self,
        reading: &Reading,
        latest_seen: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> FreshnessOutcome {
        let delay_minutes = (now - reading.timestamp()).num_milliseconds() as f64 / 60_000.0;
        FreshnessOutcome {
            score: self.score_delay(delay_minutes),
            delay_minutes,
            ordering: self.check_order(reading, latest_seen),
        }
    }
}

impl Default for FreshnessEvaluator {
    fn default() -> Self {
        Self::new(10.0, 60.0)
    }
}

use chrono::{DateTime, Utc};

use crate::checks::freshness::FreshnessOutcome;
use crate::checks::{CheckKind, FieldCheckResult, Reason, Severity};
use crate::config::{AccuracyWeights, DimensionWeights, QualityConfig, SeverityWeights};
use crate::reading::{Field, Reading};
use crate::scoring::grade::grade;
use crate::scoring::types::{DimensionScores, QualityReport};

/// Partial results of the independent checkers for one reading.
#[derive(Debug, Clone)]
pub struct CheckOutcomes {
    pub range: Vec<FieldCheckResult>,
    pub anomaly: Vec<FieldCheckResult>,
    pub consistency: Vec<FieldCheckResult>,
    pub freshness: FreshnessOutcome,
}

/// Combines checker outputs into a [`QualityReport`].
///
/// Pure: the same reading and outcomes always give the same report.
#[derive(Debug, Clone, Copy)]
pub struct ScoreAggregator {
    weights: DimensionWeights,
    accuracy_weights: AccuracyWeights,
    severity_weights: SeverityWeights,
}

impl ScoreAggregator {
    pub fn new(
        weights: DimensionWeights,
        accuracy_weights: AccuracyWeights,
        severity_weights: SeverityWeights,
    ) -> Self {
        Self {
            weights,
            accuracy_weights,
            severity_weights,
        }
    }

    pub fn from_config(config: &QualityConfig) -> Self {
        Self::new(
            config.dimension_weights,
            config.accuracy_weights,
            config.severity_weights,
        )
    }

    /// Fraction of [`Field::REQUIRED`] fields present.
    pub fn completeness(reading: &Reading) -> f64 {
        let present = Field::REQUIRED
            .iter()
            .filter(|&&f| reading.is_present(f))
            .count();
        present as f64 / Field::REQUIRED.len() as f64
    }

    /// `1 - weighted violations / checks performed` over range and anomaly
    /// results. Each out-of-range or anomalous entry costs its configured
    /// weight; the denominator counts checks, so the result is clamped to
    /// `[0, 1]`. Missing values and `insufficient_history` entries are left out.
    pub fn accuracy(&self, range: &[FieldCheckResult], anomaly: &[FieldCheckResult]) -> f64 {
        let scored_range = range.iter().filter(|r| r.reason != Some(Reason::Missing));
        let scored_anomaly = anomaly.iter().filter(|r| !r.is_skipped());

        let performed = (scored_range.clone().count() + scored_anomaly.clone().count()) as f64;
        let violations = scored_range
            .filter(|r| !r.passed)
            .map(|_| self.accuracy_weights.out_of_range)
            .chain(
                scored_anomaly
                    .filter(|r| !r.passed)
                    .map(|_| self.accuracy_weights.anomaly),
            )
            .sum::<f64>();

        ratio_score(violations, performed)
    }

    /// `1 - weighted violations / checks performed`, where a hard violation
    /// counts fully and a soft warning counts `soft / hard`.
    pub fn consistency(&self, results: &[FieldCheckResult]) -> f64 {
        let performed = results.iter().filter(|r| !r.is_skipped()).count() as f64;
        let violations: f64 = results
            .iter()
            .filter(|r| r.is_failure())
            .map(|r| match r.severity {
                Some(Severity::Soft) => self.severity_weights.soft / self.severity_weights.hard,
                _ => 1.0,
            })
            .sum();

        ratio_score(violations, performed)
    }

    /// Weighted average of the four dimensions.
    pub fn overall(&self, scores: &DimensionScores) -> f64 {
        let w = &self.weights;
        let total = w.sum();
        if total == 0.0 {
            return 0.0;
        }
        let weighted = scores.completeness * w.completeness
            + scores.accuracy * w.accuracy
            + scores.freshness * w.freshness
            + scores.consistency * w.consistency;
        (weighted / total).clamp(0.0, 1.0)
    }

    /// Builds the report. Check entries are ordered completeness, range,
    /// anomaly, consistency rules, ordering.
    pub fn compose(
        &self,
        reading: &Reading,
        outcomes: CheckOutcomes,
        evaluated_at: DateTime<Utc>,
    ) -> QualityReport {
        let CheckOutcomes {
            range,
            anomaly,
            mut consistency,
            freshness,
        } = outcomes;

        if let Some(ordering) = freshness.ordering {
            consistency.push(ordering);
        }

        let scores = DimensionScores {
            completeness: Self::completeness(reading),
            accuracy: self.accuracy(&range, &anomaly),
            freshness: freshness.score,
            consistency: self.consistency(&consistency),
        };
        let overall = self.overall(&scores);

        // Range results already explain missing numeric fields.
        let completeness_checks = Field::REQUIRED
            .iter()
            .filter(|&&f| !Field::NUMERIC.contains(&f) && !reading.is_present(f))
            .map(|&f| FieldCheckResult::unscored(f, CheckKind::Completeness, Reason::Missing));

        let checks: Vec<FieldCheckResult> = completeness_checks
            .chain(range)
            .chain(anomaly)
            .chain(consistency)
            .collect();

        QualityReport {
            city: reading.city().to_string(),
            timestamp: reading.timestamp(),
            evaluated_at,
            scores,
            overall,
            grade: grade(overall),
            checks,
        }
    }
}

impl Default for ScoreAggregator {
    fn default() -> Self {
        Self::from_config(&QualityConfig::default())
    }
}

fn ratio_score(failed: f64, performed: f64) -> f64 {
    if performed <= 0.0 {
        return 1.0;
    }
    (1.0 - failed / performed).clamp(0.0, 1.0)
}

//! The quality engine: validated readings in, quality reports out.
//!
//! [`QualityEngine`] is `Sync` and can be shared across threads. Readings for
//! different cities are scored in parallel without contention; readings for
//! the same city are serialized by that city's history lock and must be
//! submitted in arrival order.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::checks::anomaly::AnomalyDetector;
use crate::checks::consistency::{CheckContext, ConsistencyChecker, ConsistencyRule};
use crate::checks::freshness::FreshnessEvaluator;
use crate::checks::range::RangeValidator;
use crate::config::QualityConfig;
use crate::error::{ConfigurationError, QualityError};
use crate::reading::{RawReading, Reading};
use crate::scoring::aggregate::{CheckOutcomes, ScoreAggregator};
use crate::scoring::types::{QualityReport, ReportStatus};

#[derive(Debug)]
pub struct QualityEngine {
    config: QualityConfig,
    range: RangeValidator,
    anomaly: AnomalyDetector,
    consistency: ConsistencyChecker,
    freshness: FreshnessEvaluator,
    aggregator: ScoreAggregator,
}

impl QualityEngine {
    /// Builds an engine, rejecting invalid configuration up front.
    pub fn new(config: QualityConfig) -> Result<Self, ConfigurationError> {
        config.validate()?;

        Ok(Self {
            range: RangeValidator::new(config.range_bounds.clone()),
            anomaly: AnomalyDetector::from_config(&config),
            consistency: ConsistencyChecker::from_config(&config),
            freshness: FreshnessEvaluator::from_config(&config),
            aggregator: ScoreAggregator::from_config(&config),
            config,
        })
    }

    /// Adds a consistency rule after the built-in ones.
    pub fn with_rule(mut self, rule: Box<dyn ConsistencyRule>) -> Self {
        self.consistency = self.consistency.with_rule(rule);
        self
    }

    pub fn config(&self) -> &QualityConfig {
        &self.config
    }

    pub fn anomaly_detector(&self) -> &AnomalyDetector {
        &self.anomaly
    }

    /// Validates and scores one reading against the current time.
    pub fn evaluate(&self, raw: RawReading) -> Result<QualityReport, QualityError> {
        self.evaluate_at(raw, Utc::now())
    }

    /// Validates and scores one reading as of `now`.
    pub fn evaluate_at(
        &self,
        raw: RawReading,
        now: DateTime<Utc>,
    ) -> Result<QualityReport, QualityError> {
        let reading = self.validate_at(raw, now)?;
        Ok(self.score_at(&reading, now))
    }

    /// Scores each reading in order.
    ///
    /// All-or-nothing: every reading is validated before any is scored, so a
    /// malformed entry leaves history untouched.
    pub fn evaluate_batch(&self, raws: Vec<RawReading>) -> Result<Vec<QualityReport>, QualityError> {
        self.evaluate_batch_at(raws, Utc::now())
    }

    #[tracing::instrument(skip(self, raws), fields(batch_size = raws.len()))]
    pub fn evaluate_batch_at(
        &self,
        raws: Vec<RawReading>,
        now: DateTime<Utc>,
    ) -> Result<Vec<QualityReport>, QualityError> {
        let readings = raws
            .into_iter()
            .enumerate()
            .map(|(index, raw)| {
                self.validate_at(raw, now).inspect_err(|e| {
                    warn!(index, error = %e, "Rejecting batch on malformed reading");
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let reports: Vec<QualityReport> = readings.iter().map(|r| self.score_at(r, now)).collect();

        let failed = reports
            .iter()
            .filter(|r| r.status() == ReportStatus::Failed)
            .count();
        info!(reports = reports.len(), failed, "Batch evaluated");

        Ok(reports)
    }

    /// Validates a raw reading using the configured clock-skew tolerance.
    pub fn validate_at(&self, raw: RawReading, now: DateTime<Utc>) -> Result<Reading, QualityError> {
        Ok(Reading::from_raw_at(
            raw,
            now,
            self.config.clock_skew_tolerance(),
        )?)
    }

    /// Scores an already validated reading. Infallible; quality problems
    /// become scores.
    #[tracing::instrument(skip(self, reading), fields(city = reading.city(), timestamp = %reading.timestamp()))]
    pub fn score_at(&self, reading: &Reading, now: DateTime<Utc>) -> QualityReport {
        let range = self.range.validate(reading);

        let (anomaly, (consistency, freshness)) = self.anomaly.observe(reading, |history| {
            let ctx = CheckContext {
                previous: history.previous(),
            };
            (
                self.consistency.check(reading, &ctx),
                self.freshness
                    .evaluate(reading, history.latest_timestamp(), now),
            )
        });

        debug!(
            delay_minutes = freshness.delay_minutes,
            consistency_checks = consistency.len(),
            "Checks complete"
        );

        let report = self.aggregator.compose(
            reading,
            CheckOutcomes {
                range,
                anomaly,
                consistency,
                freshness,
            },
            now,
        );

        if report.status() == ReportStatus::Failed {
            warn!(overall = report.overall(), issues = ?report.issues(), "Reading failed quality checks");
        } else {
            debug!(overall = report.overall(), "Reading passed quality checks");
        }

        report
    }
}

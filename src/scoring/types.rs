//! Data types produced by scoring.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::checks::{FieldCheckResult, Reason};

/// The four dimension scores, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DimensionScores {
    pub completeness: f64,
    pub accuracy: f64,
    pub freshness: f64,
    pub consistency: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Passed,
    Failed,
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportStatus::Passed => f.write_str("passed"),
            ReportStatus::Failed => f.write_str("failed"),
        }
    }
}

/// Quality verdict for one reading. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityReport {
    pub(crate) city: String,
    pub(crate) timestamp: DateTime<Utc>,
    pub(crate) evaluated_at: DateTime<Utc>,
    pub(crate) scores: DimensionScores,
    pub(crate) overall: f64,
    pub(crate) grade: String,
    pub(crate) checks: Vec<FieldCheckResult>,
}

impl QualityReport {
    pub fn city(&self) -> &str {
        &self.city
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn evaluated_at(&self) -> DateTime<Utc> {
        self.evaluated_at
    }

    pub fn scores(&self) -> DimensionScores {
        self.scores
    }

    pub fn overall(&self) -> f64 {
        self.overall
    }

    pub fn grade(&self) -> &str {
        &self.grade
    }

    /// Every check result behind the scores, in evaluation order.
    pub fn checks(&self) -> &[FieldCheckResult] {
        &self.checks
    }

    pub fn failures(&self) -> impl Iterator<Item = &FieldCheckResult> {
        self.checks.iter().filter(|c| c.is_failure())
    }

    pub fn has_reason(&self, reason: Reason) -> bool {
        self.checks.iter().any(|c| c.reason == Some(reason))
    }

    /// `Failed` if any check failed (missing values included).
    pub fn status(&self) -> ReportStatus {
        if self.failures().next().is_some() {
            ReportStatus::Failed
        } else {
            ReportStatus::Passed
        }
    }

    /// Human-readable descriptions of each failed check.
    pub fn issues(&self) -> Vec<String> {
        self.failures().map(|c| c.to_string()).collect()
    }
}

/// A [`QualityReport`] flattened into one CSV row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRecord {
    pub city: String,
    pub timestamp: DateTime<Utc>,
    pub evaluated_at: DateTime<Utc>,
    pub completeness: f64,
    pub accuracy: f64,
    pub freshness: f64,
    pub consistency: f64,
    pub overall: f64,
    pub grade: String,
    pub status: ReportStatus,
    pub checks_performed: usize,
    /// `;`-separated reason codes of failed checks.
    pub reasons: String,
    /// `;`-separated issue descriptions.
    pub issues: String,
}

impl ReportRecord {
    pub fn reason_codes(&self) -> impl Iterator<Item = &str> {
        self.reasons.split(';').filter(|s| !s.is_empty())
    }
}

impl From<&QualityReport> for ReportRecord {
    fn from(report: &QualityReport) -> Self {
        let reasons: Vec<&str> = report
            .failures()
            .filter_map(|c| c.reason.map(|r| r.as_str()))
            .collect();

        ReportRecord {
            city: report.city.clone(),
            timestamp: report.timestamp,
            evaluated_at: report.evaluated_at,
            completeness: report.scores.completeness,
            accuracy: report.scores.accuracy,
            freshness: report.scores.freshness,
            consistency: report.scores.consistency,
            overall: report.overall,
            grade: report.grade.clone(),
            status: report.status(),
            checks_performed: report
                .checks
                .iter()
                .filter(|c| !c.is_skipped() && c.reason != Some(Reason::Missing))
                .count(),
            reasons: reasons.join(";"),
            issues: report.issues().join(";"),
        }
    }
}

/// Roll-up of one city's reports.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CitySummary {
    pub(crate) city: String,
    pub(crate) reports: usize,
    pub(crate) failed_reports: usize,
    pub(crate) mean_scores: DimensionScores,
    pub(crate) mean_overall: f64,
    pub(crate) min_overall: f64,
    pub(crate) grade: String,
    pub(crate) last_timestamp: DateTime<Utc>,
    pub(crate) issue_counts: BTreeMap<String, usize>,
}

impl CitySummary {
    pub fn city(&self) -> &str {
        &self.city
    }

    pub fn reports(&self) -> usize {
        self.reports
    }

    pub fn failed_reports(&self) -> usize {
        self.failed_reports
    }

    pub fn mean_scores(&self) -> DimensionScores {
        self.mean_scores
    }

    pub fn mean_overall(&self) -> f64 {
        self.mean_overall
    }

    pub fn min_overall(&self) -> f64 {
        self.min_overall
    }

    pub fn grade(&self) -> &str {
        &self.grade
    }

    pub fn issue_counts(&self) -> &BTreeMap<String, usize> {
        &self.issue_counts
    }
}

/// Index of every city in a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    pub(crate) generated_at: DateTime<Utc>,
    pub(crate) total_reports: usize,
    pub(crate) failed_reports: usize,
    pub(crate) cities: Vec<CitySummary>,
}

impl BatchSummary {
    pub fn total_reports(&self) -> usize {
        self.total_reports
    }

    pub fn failed_reports(&self) -> usize {
        self.failed_reports
    }

    pub fn cities(&self) -> &[CitySummary] {
        &self.cities
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QualityConfig;
    use crate::engine::QualityEngine;
    use crate::reading::RawReading;
    use chrono::TimeZone;

    #[test]
    fn test_record_counts_only_scored_checks() {
        let engine = QualityEngine::new(QualityConfig::default()).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 13, 0, 0).unwrap();
        let raw = RawReading {
            city: "Berlin".to_string(),
            timestamp: now.to_rfc3339(),
            temperature: Some(22.0),
            humidity: None,
            pressure: Some(1013.0),
            wind_speed: Some(3.0),
            weather_condition: Some("clear".to_string()),
            dew_point: None,
        };
        let report = engine.evaluate_at(raw, now).unwrap();
        let record = ReportRecord::from(&report);

        // Three range checks plus the snow rule; the missing humidity entry
        // and the cold-start anomaly entries are not counted.
        assert_eq!(record.checks_performed, 4);
        assert_eq!(record.reason_codes().collect::<Vec<_>>(), vec!["missing"]);
        assert_eq!(record.status, ReportStatus::Failed);
    }
}

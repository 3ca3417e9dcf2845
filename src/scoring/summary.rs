//! Per-city roll-up of scored reports.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::scoring::grade::grade;
use crate::scoring::types::{
    BatchSummary, CitySummary, DimensionScores, QualityReport, ReportRecord, ReportStatus,
};
use crate::scoring::utility::{mean, min};

/// Summarizes report rows, one [`CitySummary`] per city in name order.
pub fn summarize(records: &[ReportRecord], generated_at: DateTime<Utc>) -> BatchSummary {
    let mut by_city: BTreeMap<&str, Vec<&ReportRecord>> = BTreeMap::new();
    for record in records {
        by_city.entry(record.city.as_str()).or_default().push(record);
    }

    let cities: Vec<CitySummary> = by_city
        .into_iter()
        .filter_map(|(city, rows)| summarize_city(city, &rows))
        .collect();

    BatchSummary {
        generated_at,
        total_reports: records.len(),
        failed_reports: cities.iter().map(|c| c.failed_reports).sum(),
        cities,
    }
}

/// Convenience wrapper over [`summarize`] for in-memory reports.
pub fn summarize_reports(reports: &[QualityReport], generated_at: DateTime<Utc>) -> BatchSummary {
    let records: Vec<ReportRecord> = reports.iter().map(ReportRecord::from).collect();
    summarize(&records, generated_at)
}

fn summarize_city(city: &str, rows: &[&ReportRecord]) -> Option<CitySummary> {
    let last_timestamp = rows.iter().map(|r| r.timestamp).max()?;

    let column = |pick: fn(&ReportRecord) -> f64| -> Vec<f64> { rows.iter().map(|r| pick(r)).collect() };
    let overall = column(|r| r.overall);
    let mean_overall = mean(&overall);

    let mut issue_counts: BTreeMap<String, usize> = BTreeMap::new();
    for row in rows {
        for code in row.reason_codes() {
            *issue_counts.entry(code.to_string()).or_default() += 1;
        }
    }

    Some(CitySummary {
        city: city.to_string(),
        reports: rows.len(),
        failed_reports: rows
            .iter()
            .filter(|r| r.status == ReportStatus::Failed)
            .count(),
        mean_scores: DimensionScores {
            completeness: mean(&column(|r| r.completeness)),
            accuracy: mean(&column(|r| r.accuracy)),
            freshness: mean(&column(|r| r.freshness)),
            consistency: mean(&column(|r| r.consistency)),
        },
        mean_overall,
        min_overall: min(&overall).unwrap_or(0.0),
        grade: grade(mean_overall),
        last_timestamp,
        issue_counts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_empty_input_gives_empty_summary() {
        let summary = summarize(&[], now());
        assert_eq!(summary.total_reports(), 0);
        assert!(summary.cities().is_empty());
    }

    #[test]
    fn test_groups_by_city_in_name_order() {
        let records = vec![
            record("Tokyo", 0, 1.0, ""),
            record("Berlin", 0, 0.5, "out_of_range"),
            record("Berlin", 10, 0.9, "out_of_range;anomalous"),
        ];
        let summary = summarize(&records, now());

        assert_eq!(summary.total_reports(), 3);
        assert_eq!(summary.failed_reports(), 2);

        let cities: Vec<&str> = summary.cities().iter().map(|c| c.city()).collect();
        assert_eq!(cities, vec!["Berlin", "Tokyo"]);

        let berlin = &summary.cities()[0];
        assert_eq!(berlin.reports(), 2);
        assert!((berlin.mean_overall() - 0.7).abs() < 1e-12);
        assert_eq!(berlin.min_overall(), 0.5);
        assert_eq!(berlin.grade(), "C");
        assert_eq!(berlin.issue_counts().get("out_of_range"), Some(&2));
        assert_eq!(berlin.issue_counts().get("anomalous"), Some(&1));
        assert_eq!(berlin.last_timestamp, now() + Duration::minutes(10));
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 13, 0, 0).unwrap()
    }

    fn record(city: &str, minutes: i64, overall: f64, reasons: &str) -> ReportRecord {
        ReportRecord {
            city: city.to_string(),
            timestamp: now() + Duration::minutes(minutes),
            evaluated_at: now(),
            completeness: 1.0,
            accuracy: overall,
            freshness: 1.0,
            consistency: 1.0,
            overall,
            grade: grade(overall),
            status: if reasons.is_empty() {
                ReportStatus::Passed
            } else {
                ReportStatus::Failed
            },
            checks_performed: 8,
            reasons: reasons.to_string(),
            issues: String::new(),
        }
    }
}

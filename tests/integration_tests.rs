use chrono::{DateTime, Duration, TimeZone, Utc};
use weather_quality_rater::checks::Reason;
use weather_quality_rater::parser::parse_readings;
use weather_quality_rater::scoring::summary::summarize_reports;
use weather_quality_rater::scoring::types::{ReportRecord, ReportStatus};
use weather_quality_rater::{ConfigurationError, QualityConfig, QualityEngine, RawReading};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 13, 0, 0).unwrap()
}

fn engine() -> QualityEngine {
    QualityEngine::new(QualityConfig::default()).expect("default config is valid")
}

fn fixture() -> Vec<RawReading> {
    let bytes = include_bytes!("fixtures/sample_readings.json");
    parse_readings(bytes).expect("Failed to parse readings")
}

fn records_for(reports: &[ReportRecord], city: &str) -> Vec<ReportRecord> {
    reports.iter().filter(|r| r.city == city).cloned().collect()
}

#[test]
fn test_full_pipeline() {
    let reports = engine().evaluate_batch_at(fixture(), now()).unwrap();

    assert_eq!(reports.len(), 7);
    assert!(reports.iter().all(|r| (0.0..=1.0).contains(&r.overall())));

    // London 12:30 has no humidity.
    assert!(reports[2].has_reason(Reason::Missing));
    assert_eq!(reports[2].scores().completeness, 0.8);

    // Tokyo 12:30 reports a dew point above the air temperature.
    assert!(reports[3].has_reason(Reason::DewPointExceedsTemperature));
    assert!(reports[3].scores().consistency < 1.0);

    // London 12:40 claims snow at 15 °C.
    assert!(reports[4].has_reason(Reason::ConditionTemperatureMismatch));

    // Tokyo 12:40: clear at 99% humidity and a 180 m/s wind.
    assert!(reports[5].has_reason(Reason::SuspiciousClearHighHumidity));
    assert!(reports[5].has_reason(Reason::OutOfRange));
    assert!(reports[5].scores().accuracy < 1.0);

    let last = &reports[6];
    assert_eq!(last.city(), "London");
    assert_eq!(last.status(), ReportStatus::Passed);
    assert_eq!(last.overall(), 1.0);
    assert_eq!(last.grade(), "A+");

    let summary = summarize_reports(&reports, now());
    assert_eq!(summary.total_reports(), 7);
    assert_eq!(summary.cities().len(), 2);
}

#[test]
fn test_interleaved_cities_score_like_separate_streams() {
    let interleaved: Vec<ReportRecord> = engine()
        .evaluate_batch_at(fixture(), now())
        .unwrap()
        .iter()
        .map(ReportRecord::from)
        .collect();

    let separate = engine();
    let mut grouped = Vec::new();
    for city in ["London", "Tokyo"] {
        let readings: Vec<RawReading> = fixture().into_iter().filter(|r| r.city == city).collect();
        grouped.extend(
            separate
                .evaluate_batch_at(readings, now())
                .unwrap()
                .iter()
                .map(ReportRecord::from),
        );
    }

    for city in ["London", "Tokyo"] {
        assert_eq!(records_for(&interleaved, city), records_for(&grouped, city));
    }
}

#[test]
fn test_spike_after_stable_history_is_anomalous() {
    let start = now() - Duration::minutes(110);
    let mut batch: Vec<RawReading> = (0..10)
        .map(|i| stable(start + Duration::minutes(i * 10), if i % 2 == 0 { 3.0 } else { 7.0 }))
        .collect();
    batch.push(stable(now(), 40.0));

    let reports = engine().evaluate_batch_at(batch, now()).unwrap();

    assert!(reports[..10].iter().all(|r| !r.has_reason(Reason::Anomalous)));
    let spike = &reports[10];
    assert!(spike.has_reason(Reason::Anomalous));
    assert!(!spike.has_reason(Reason::OutOfRange));
    assert!(spike.scores().accuracy < 1.0);
}

#[test]
fn test_value_within_spread_is_not_anomalous() {
    let start = now() - Duration::minutes(110);
    let mut batch: Vec<RawReading> = (0..10)
        .map(|i| stable(start + Duration::minutes(i * 10), if i % 2 == 0 { 3.0 } else { 7.0 }))
        .collect();
    batch.push(stable(now(), 11.0));

    let reports = engine().evaluate_batch_at(batch, now()).unwrap();
    assert!(!reports[10].has_reason(Reason::Anomalous));
}

#[test]
fn test_malformed_entry_rejects_whole_batch() {
    let engine = engine();
    let mut readings = fixture();
    readings[4].humidity = Some(f64::NAN);

    assert!(engine.evaluate_batch_at(readings, now()).is_err());
    assert!(engine.anomaly_detector().cities().is_empty());
}

#[test]
fn test_weights_must_sum_to_one() {
    let mut config = QualityConfig::default();
    config.dimension_weights.completeness = 0.24;

    assert!(matches!(
        QualityEngine::new(config),
        Err(ConfigurationError::WeightsDoNotSumToOne { .. })
    ));
}

fn stable(at: DateTime<Utc>, temperature: f64) -> RawReading {
    RawReading {
        city: "Reykjavik".to_string(),
        timestamp: at.to_rfc3339(),
        temperature: Some(temperature),
        humidity: Some(80.0),
        pressure: Some(1002.0),
        wind_speed: Some(6.0),
        weather_condition: Some("cloudy".to_string()),
        dew_point: None,
    }
}

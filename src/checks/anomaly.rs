//! Statistical outlier detection against each city's recent history.
//!
//! A value is anomalous when it lies more than `k` population standard
//! deviations from the mean of the same field over the city's window.
//! Fields with fewer than `min_samples` historical values are marked
//! [`Reason::InsufficientHistory`] instead of pass/fail.

use tracing::debug;

use crate::checks::{CheckKind, FieldCheckResult, Reason, Severity};
use crate::config::QualityConfig;
use crate::history::{self, CityHistory, HistoryStore};
use crate::reading::{Field, Reading};
use crate::scoring::utility::{mean, stddev};

/// Owns the per-city history and scores readings against it.
#[derive(Debug)]
pub struct AnomalyDetector {
    store: HistoryStore,
    k: f64,
    min_samples: usize,
    min_stddev: f64,
}

impl AnomalyDetector {
    pub fn new(k: f64, min_samples: usize, window_size: usize) -> Self {
        Self {
            store: HistoryStore::new(window_size),
            k,
            min_samples,
            min_stddev: 0.0,
        }
    }

    /// Floors the history's standard deviation at `min_stddev`.
    pub fn with_min_stddev(mut self, min_stddev: f64) -> Self {
        self.min_stddev = min_stddev;
        self
    }

    pub fn from_config(config: &QualityConfig) -> Self {
        Self::new(
            config.anomaly_k,
            config.anomaly_min_samples,
            config.history_window_size,
        )
        .with_min_stddev(config.anomaly_min_stddev)
    }

    /// Scores `reading` against `history` without touching it.
    ///
    /// Returns one entry per present numeric field; missing fields are left
    /// to the range validator.
    pub fn score(&self, reading: &Reading, history: &CityHistory) -> Vec<FieldCheckResult> {
        Field::NUMERIC
            .iter()
            .filter_map(|&field| {
                let value = reading.value(field)?;
                let samples = history.values(field);

                if samples.len() < self.min_samples {
                    return Some(FieldCheckResult::unscored(
                        field,
                        CheckKind::Anomaly,
                        Reason::InsufficientHistory,
                    ));
                }

                let m = mean(&samples);
                let sd = stddev(&samples, m).max(self.min_stddev);
                let deviation = (value - m).abs();

                if deviation > self.k * sd {
                    debug!(city = reading.city(), %field, value, mean = m, stddev = sd, "Anomalous value");
                    Some(
                        FieldCheckResult::fail(field, CheckKind::Anomaly, Severity::Hard, Reason::Anomalous)
                            .with_detail(format!(
                                "{:.2} deviates {:.2} from mean {:.2} (stddev {:.2})",
                                value, deviation, m, sd
                            )),
                    )
                } else {
                    Some(FieldCheckResult::pass(field, CheckKind::Anomaly))
                }
            })
            .collect()
    }

    /// Scores `reading`, then records it in its city's window.
    ///
    /// The city's lock is held for the whole call, so `inspect` sees the
    /// history exactly as it was before this reading and concurrent calls
    /// for the same city are serialized. Unknown cities start empty.
    pub fn observe<R>(
        &self,
        reading: &Reading,
        inspect: impl FnOnce(&CityHistory) -> R,
    ) -> (Vec<FieldCheckResult>, R) {
        let slot = self.store.slot(reading.city());
        let mut guard = history::lock(&slot);

        let inspected = inspect(&*guard);
        let results = self.score(reading, &guard);
        guard.push(reading.clone());

        (results, inspected)
    }

    /// A copy of the current window for `city`.
    pub fn history(&self, city: &str) -> Option<CityHistory> {
        self.store.snapshot(city)
    }

    pub fn cities(&self) -> Vec<String> {
        self.store.cities()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reading::RawReading;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    #[test]
    fn test_cold_start_marks_insufficient_history() {
        let detector = AnomalyDetector::new(3.0, 10, 100);
        let (results, _) = detector.observe(&reading(0, 40.0), |_| ());

        assert_eq!(results.len(), 4);
        assert!(results.iter().all(|r| r.is_skipped()));
    }

    #[test]
    fn test_spike_is_flagged_against_stable_history() {
        let detector = AnomalyDetector::new(3.0, 10, 100);
        // Alternating 3 and 7: mean 5.0, population stddev 2.0.
        for i in 0..10 {
            let t = if i % 2 == 0 { 3.0 } else { 7.0 };
            detector.observe(&reading(i, t), |_| ());
        }

        let (results, _) = detector.observe(&reading(10, 40.0), |_| ());
        let temperature = &results[0];

        assert_eq!(temperature.field, Field::Temperature);
        assert!(!temperature.passed);
        assert_eq!(temperature.reason, Some(Reason::Anomalous));
        // Humidity is constant in history and unchanged here, so it passes.
        assert!(results[1].passed);
    }

    #[test]
    fn test_value_within_k_sigma_passes() {
        let detector = AnomalyDetector::new(3.0, 10, 100);
        for i in 0..10 {
            let t = if i % 2 == 0 { 3.0 } else { 7.0 };
            detector.observe(&reading(i, t), |_| ());
        }

        // 5 + 3 * 2 = 11 is the edge; equal is not "exceeds".
        let (results, _) = detector.observe(&reading(10, 11.0), |_| ());
        assert!(results[0].passed);
    }

    #[test]
    fn test_constant_history_flags_any_change_without_floor() {
        let detector = AnomalyDetector::new(3.0, 10, 100);
        for i in 0..10 {
            detector.observe(&reading(i, 5.0), |_| ());
        }

        let (results, _) = detector.observe(&reading_with_humidity(10, 5.0, 50.1), |_| ());
        assert_eq!(results[1].field, Field::Humidity);
        assert_eq!(results[1].reason, Some(Reason::Anomalous));
        assert!(results[0].passed);
    }

    #[test]
    fn test_stddev_floor_tolerates_small_changes() {
        let detector = AnomalyDetector::new(3.0, 10, 100).with_min_stddev(0.1);
        for i in 0..10 {
            detector.observe(&reading(i, 5.0), |_| ());
        }

        let (results, _) = detector.observe(&reading_with_humidity(10, 5.0, 50.1), |_| ());
        assert!(results[1].passed);

        let (results, _) = detector.observe(&reading_with_humidity(11, 5.0, 51.0), |_| ());
        assert_eq!(results[1].reason, Some(Reason::Anomalous));
    }

    #[test]
    fn test_reading_is_not_compared_against_itself() {
        let detector = AnomalyDetector::new(3.0, 2, 100);
        detector.observe(&reading(0, 5.0), |_| ());

        // One prior sample: still insufficient, even though recording this
        // reading would make two.
        let (results, seen) = detector.observe(&reading(1, 5.0), |h| h.len());
        assert_eq!(seen, 1);
        assert!(results[0].is_skipped());
        assert_eq!(detector.history("Berlin").map(|h| h.len()), Some(2));
    }

    #[test]
    fn test_window_evicts_fifo() {
        let detector = AnomalyDetector::new(3.0, 2, 3);
        for i in 0..5 {
            detector.observe(&reading(i, i as f64), |_| ());
        }
        let history = detector.history("Berlin").unwrap();
        assert_eq!(history.values(Field::Temperature), vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_missing_field_produces_no_anomaly_entry() {
        let detector = AnomalyDetector::new(3.0, 10, 100);
        let raw = RawReading {
            city: "Berlin".to_string(),
            timestamp: base().to_rfc3339(),
            temperature: Some(5.0),
            ..Default::default()
        };
        let reading = Reading::from_raw_at(raw, base(), Duration::minutes(5)).unwrap();

        let (results, _) = detector.observe(&reading, |_| ());
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].field, Field::Temperature);
    }

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn reading(minutes: i64, temperature: f64) -> Reading {
        reading_with_humidity(minutes, temperature, 50.0)
    }

    fn reading_with_humidity(minutes: i64, temperature: f64, humidity: f64) -> Reading {
        let raw = RawReading {
            city: "Berlin".to_string(),
            timestamp: (base() + Duration::minutes(minutes * 10)).to_rfc3339(),
            temperature: Some(temperature),
            humidity: Some(humidity),
            pressure: Some(1013.0),
            wind_speed: Some(3.0),
            weather_condition: Some("cloudy".to_string()),
            dew_point: None,
        };
        Reading::from_raw_at(raw, base() + Duration::days(1), Duration::minutes(5)).unwrap()
    }
}

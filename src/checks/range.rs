//! Fixed physical bound checks.

use tracing::debug;

use crate::checks::{CheckKind, FieldCheckResult, Reason, Severity};
use crate::config::RangeBounds;
use crate::reading::{Field, Reading};

/// Checks each numeric field against its inclusive physical bound.
#[derive(Debug, Clone)]
pub struct RangeValidator {
    bounds: RangeBounds,
}

impl RangeValidator {
    pub fn new(bounds: RangeBounds) -> Self {
        Self { bounds }
    }

    /// Returns one result per numeric field, in [`Field::NUMERIC`] order.
    ///
    /// Absent fields yield [`Reason::Missing`] (a completeness problem);
    /// present values outside their bound yield [`Reason::OutOfRange`].
    pub fn validate(&self, reading: &Reading) -> Vec<FieldCheckResult> {
        Field::NUMERIC
            .iter()
            .map(|&field| {
                let Some(value) = reading.value(field) else {
                    return FieldCheckResult::unscored(field, CheckKind::Range, Reason::Missing);
                };
                let Some(bounds) = self.bounds.get(field) else {
                    return FieldCheckResult::pass(field, CheckKind::Range);
                };

                if bounds.contains(value) {
                    FieldCheckResult::pass(field, CheckKind::Range)
                } else {
                    debug!(city = reading.city(), %field, value, min = bounds.min, max = bounds.max, "Value out of range");
                    FieldCheckResult::fail(field, CheckKind::Range, Severity::Hard, Reason::OutOfRange)
                        .with_detail(format!(
                            "{} outside [{}, {}]",
                            value, bounds.min, bounds.max
                        ))
                }
            })
            .collect()
    }
}

impl Default for RangeValidator {
    fn default() -> Self {
        Self::new(RangeBounds::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reading::RawReading;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    #[test]
    fn test_all_in_bounds_passes() {
        let results = RangeValidator::default().validate(&reading(22.0, 50.0, 1013.0, 3.0));

        assert_eq!(results.len(), 4);
        assert!(results.iter().all(|r| r.passed));
    }

    #[test]
    fn test_temperature_bounds_are_inclusive() {
        let validator = RangeValidator::default();

        for t in [-90.0, 60.0] {
            let results = validator.validate(&reading(t, 50.0, 1013.0, 3.0));
            assert!(results[0].passed, "{} should be in range", t);
        }
        for t in [-90.1, 60.1] {
            let results = validator.validate(&reading(t, 50.0, 1013.0, 3.0));
            assert_eq!(results[0].field, Field::Temperature);
            assert!(!results[0].passed, "{} should be out of range", t);
            assert_eq!(results[0].reason, Some(Reason::OutOfRange));
        }
    }

    #[test]
    fn test_negative_wind_and_high_humidity_fail() {
        let results = RangeValidator::default().validate(&reading(22.0, 150.0, 1013.0, -1.0));

        assert_eq!(results[1].reason, Some(Reason::OutOfRange));
        assert_eq!(results[3].reason, Some(Reason::OutOfRange));
        assert!(results[0].passed);
        assert!(results[2].passed);
    }

    #[test]
    fn test_missing_field_is_reported_as_missing() {
        let raw = RawReading {
            city: "Berlin".to_string(),
            timestamp: "2024-05-01T12:00:00Z".to_string(),
            temperature: Some(22.0),
            humidity: None,
            pressure: Some(1013.0),
            wind_speed: Some(3.0),
            weather_condition: None,
            dew_point: None,
        };
        let reading = Reading::from_raw_at(raw, fixed_now(), Duration::minutes(5)).unwrap();

        let results = RangeValidator::default().validate(&reading);

        assert_eq!(results[1].field, Field::Humidity);
        assert_eq!(results[1].reason, Some(Reason::Missing));
        assert_eq!(results[1].severity, None);
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 13, 0, 0).unwrap()
    }

    fn reading(temperature: f64, humidity: f64, pressure: f64, wind_speed: f64) -> Reading {
        let raw = RawReading {
            city: "Berlin".to_string(),
            timestamp: "2024-05-01T12:00:00Z".to_string(),
            temperature: Some(temperature),
            humidity: Some(humidity),
            pressure: Some(pressure),
            wind_speed: Some(wind_speed),
            weather_condition: Some("clear".to_string()),
            dew_point: None,
        };
        Reading::from_raw_at(raw, fixed_now(), Duration::minutes(5)).unwrap()
    }
}

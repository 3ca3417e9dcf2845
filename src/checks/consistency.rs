//! Cross-field physical plausibility rules.
//!
//! Each rule is an independent [`ConsistencyRule`]. A rule returns `None`
//! when its inputs are missing (the check was not performed) and a pass or
//! fail result otherwise, so the aggregator can count checks performed.

use std::fmt;

use tracing::debug;

use crate::checks::{CheckKind, FieldCheckResult, Reason, Severity};
use crate::config::QualityConfig;
use crate::reading::{Field, Reading, WeatherCondition};

/// What a rule may look at besides the reading itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct CheckContext<'a> {
    /// The city's immediately preceding reading, in arrival order.
    pub previous: Option<&'a Reading>,
}

pub trait ConsistencyRule: fmt::Debug + Send + Sync {
    fn name(&self) -> &'static str;

    fn check(&self, reading: &Reading, ctx: &CheckContext<'_>) -> Option<FieldCheckResult>;
}

/// Dew point cannot exceed air temperature.
#[derive(Debug, Clone, Copy)]
pub struct DewPointRule;

impl ConsistencyRule for DewPointRule {
    fn name(&self) -> &'static str {
        "dew_point"
    }

    fn check(&self, reading: &Reading, _ctx: &CheckContext<'_>) -> Option<FieldCheckResult> {
        let dew_point = reading.dew_point()?;
        let temperature = reading.temperature()?;

        Some(if dew_point > temperature {
            FieldCheckResult::fail(
                Field::DewPoint,
                CheckKind::Consistency,
                Severity::Hard,
                Reason::DewPointExceedsTemperature,
            )
            .with_detail(format!("dew point {} > temperature {}", dew_point, temperature))
        } else {
            FieldCheckResult::pass(Field::DewPoint, CheckKind::Consistency)
        })
    }
}

/// Snow above a temperature ceiling is implausible.
#[derive(Debug, Clone, Copy)]
pub struct SnowTemperatureRule {
    pub max_temperature: f64,
}

impl ConsistencyRule for SnowTemperatureRule {
    fn name(&self) -> &'static str {
        "snow_temperature"
    }

    fn check(&self, reading: &Reading, _ctx: &CheckContext<'_>) -> Option<FieldCheckResult> {
        let condition = reading.weather_condition()?;
        let temperature = reading.temperature()?;

        Some(
            if *condition == WeatherCondition::Snow && temperature > self.max_temperature {
                FieldCheckResult::fail(
                    Field::WeatherCondition,
                    CheckKind::Consistency,
                    Severity::Hard,
                    Reason::ConditionTemperatureMismatch,
                )
                .with_detail(format!("snow at {} °C", temperature))
            } else {
                FieldCheckResult::pass(Field::WeatherCondition, CheckKind::Consistency)
            },
        )
    }
}

/// Clear sky with near-saturated air is suspicious.
#[derive(Debug, Clone, Copy)]
pub struct ClearHumidityRule {
    pub max_humidity: f64,
}

impl ConsistencyRule for ClearHumidityRule {
    fn name(&self) -> &'static str {
        "clear_humidity"
    }

    fn check(&self, reading: &Reading, _ctx: &CheckContext<'_>) -> Option<FieldCheckResult> {
        let condition = reading.weather_condition()?;
        let humidity = reading.humidity()?;

        Some(
            if *condition == WeatherCondition::Clear && humidity > self.max_humidity {
                FieldCheckResult::fail(
                    Field::Humidity,
                    CheckKind::Consistency,
                    Severity::Soft,
                    Reason::SuspiciousClearHighHumidity,
                )
                .with_detail(format!("clear sky at {}% humidity", humidity))
            } else {
                FieldCheckResult::pass(Field::Humidity, CheckKind::Consistency)
            },
        )
    }
}

/// Very hot and very dry at once is suspicious.
#[derive(Debug, Clone, Copy)]
pub struct HotDryRule {
    pub min_temperature: f64,
    pub max_humidity: f64,
}

impl ConsistencyRule for HotDryRule {
    fn name(&self) -> &'static str {
        "hot_dry"
    }

    fn check(&self, reading: &Reading, _ctx: &CheckContext<'_>) -> Option<FieldCheckResult> {
        let temperature = reading.temperature()?;
        let humidity = reading.humidity()?;

        Some(
            if temperature > self.min_temperature && humidity < self.max_humidity {
                FieldCheckResult::fail(
                    Field::Temperature,
                    CheckKind::Consistency,
                    Severity::Soft,
                    Reason::SuspiciousTemperatureHumidity,
                )
                .with_detail(format!("{} °C at {}% humidity", temperature, humidity))
            } else {
                FieldCheckResult::pass(Field::Temperature, CheckKind::Consistency)
            },
        )
    }
}

/// Bounds how fast a field may change between consecutive readings.
///
/// Within `window_minutes` the change may not exceed `max_delta`; over a
/// longer gap the allowance scales with elapsed time. Out-of-order or
/// same-instant pairs get the base allowance.
#[derive(Debug, Clone, Copy)]
pub struct RateOfChangeRule {
    pub field: Field,
    pub max_delta: f64,
    pub window_minutes: f64,
}

impl RateOfChangeRule {
    fn allowance(&self, elapsed_minutes: f64) -> f64 {
        self.max_delta * (elapsed_minutes / self.window_minutes).max(1.0)
    }
}

impl ConsistencyRule for RateOfChangeRule {
    fn name(&self) -> &'static str {
        match self.field {
            Field::Temperature => "temperature_rate_of_change",
            Field::Pressure => "pressure_rate_of_change",
            _ => "rate_of_change",
        }
    }

    fn check(&self, reading: &Reading, ctx: &CheckContext<'_>) -> Option<FieldCheckResult> {
        let previous = ctx.previous?;
        let before = previous.value(self.field)?;
        let now = reading.value(self.field)?;

        let elapsed_minutes =
            (reading.timestamp() - previous.timestamp()).num_milliseconds() as f64 / 60_000.0;
        let delta = (now - before).abs();
        let allowance = self.allowance(elapsed_minutes);

        Some(if delta > allowance {
            FieldCheckResult::fail(
                self.field,
                CheckKind::Consistency,
                Severity::Hard,
                Reason::ImplausibleRateOfChange,
            )
            .with_detail(format!(
                "changed by {:.2} in {:.1} min (allowed {:.2})",
                delta, elapsed_minutes, allowance
            ))
        } else {
            FieldCheckResult::pass(self.field, CheckKind::Consistency)
        })
    }
}

/// Runs a flat list of rules in order.
#[derive(Debug)]
pub struct ConsistencyChecker {
    rules: Vec<Box<dyn ConsistencyRule>>,
}

impl ConsistencyChecker {
    pub fn new(rules: Vec<Box<dyn ConsistencyRule>>) -> Self {
        Self { rules }
    }

    /// The built-in rule set, parameterised by `config`.
    pub fn from_config(config: &QualityConfig) -> Self {
        let roc = config.rate_of_change;
        Self::new(vec![
            Box::new(DewPointRule),
            Box::new(SnowTemperatureRule {
                max_temperature: config.snow_max_temperature,
            }),
            Box::new(ClearHumidityRule {
                max_humidity: config.clear_max_humidity,
            }),
            Box::new(HotDryRule {
                min_temperature: config.hot_dry.min_temperature,
                max_humidity: config.hot_dry.max_humidity,
            }),
            Box::new(RateOfChangeRule {
                field: Field::Temperature,
                max_delta: roc.temperature_max_delta,
                window_minutes: roc.window_minutes,
            }),
            Box::new(RateOfChangeRule {
                field: Field::Pressure,
                max_delta: roc.pressure_max_delta,
                window_minutes: roc.window_minutes,
            }),
        ])
    }

    /// Appends a rule; it runs after the existing ones.
    pub fn with_rule(mut self, rule: Box<dyn ConsistencyRule>) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Results of every rule that could be performed, in rule order.
    pub fn check(&self, reading: &Reading, ctx: &CheckContext<'_>) -> Vec<FieldCheckResult> {
        self.rules
            .iter()
            .filter_map(|rule| {
                let result = rule.check(reading, ctx);
                if let Some(r) = result.as_ref().filter(|r| !r.passed) {
                    debug!(city = reading.city(), rule = rule.name(), reason = ?r.reason, "Consistency rule failed");
                }
                result
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reading::RawReading;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    #[test]
    fn test_dew_point_above_temperature_is_hard_violation() {
        let mut raw = base_raw();
        raw.dew_point = Some(25.0);
        let results = checker().check(&build(raw), &CheckContext::default());

        let dew = results
            .iter()
            .find(|r| r.field == Field::DewPoint)
            .expect("dew point rule ran");
        assert_eq!(dew.reason, Some(Reason::DewPointExceedsTemperature));
        assert_eq!(dew.severity, Some(Severity::Hard));
    }

    #[test]
    fn test_dew_point_rule_skipped_without_dew_point() {
        let results = checker().check(&build(base_raw()), &CheckContext::default());
        assert!(results.iter().all(|r| r.field != Field::DewPoint));
    }

    #[test]
    fn test_warm_snow_is_mismatch() {
        let mut raw = base_raw();
        raw.weather_condition = Some("Snow".to_string());
        raw.temperature = Some(12.0);

        let results = checker().check(&build(raw), &CheckContext::default());
        assert!(results
            .iter()
            .any(|r| r.reason == Some(Reason::ConditionTemperatureMismatch)));
    }

    #[test]
    fn test_cold_snow_is_fine() {
        let mut raw = base_raw();
        raw.weather_condition = Some("Snow".to_string());
        raw.temperature = Some(-2.0);

        let results = checker().check(&build(raw), &CheckContext::default());
        assert!(results.iter().all(|r| r.passed));
    }

    #[test]
    fn test_clear_with_saturated_air_is_soft_warning() {
        let mut raw = base_raw();
        raw.humidity = Some(97.0);

        let results = checker().check(&build(raw), &CheckContext::default());
        let warning = results
            .iter()
            .find(|r| r.reason == Some(Reason::SuspiciousClearHighHumidity))
            .expect("clear/humidity warning");
        assert_eq!(warning.severity, Some(Severity::Soft));
    }

    #[test]
    fn test_hot_and_dry_is_soft_warning() {
        let mut raw = base_raw();
        raw.temperature = Some(40.0);
        raw.humidity = Some(5.0);

        let results = checker().check(&build(raw), &CheckContext::default());
        let warning = results
            .iter()
            .find(|r| r.reason == Some(Reason::SuspiciousTemperatureHumidity))
            .expect("hot/dry warning");
        assert_eq!(warning.severity, Some(Severity::Soft));
    }

    #[test]
    fn test_rate_of_change_skipped_without_previous() {
        let results = checker().check(&build(base_raw()), &CheckContext::default());
        // dew point absent, no previous: snow, clear and hot/dry rules only.
        assert_eq!(results.len(), 3);
    }

    #[test]
    fn test_temperature_jump_within_window_is_flagged() {
        let previous = build(base_raw());
        let mut raw = base_raw();
        raw.timestamp = (base() + Duration::minutes(5)).to_rfc3339();
        raw.temperature = Some(40.0);
        let current = build(raw);

        let ctx = CheckContext {
            previous: Some(&previous),
        };
        let results = checker().check(&current, &ctx);
        let roc: Vec<_> = results
            .iter()
            .filter(|r| r.reason == Some(Reason::ImplausibleRateOfChange))
            .collect();
        assert_eq!(roc.len(), 1);
        assert_eq!(roc[0].field, Field::Temperature);
    }

    #[test]
    fn test_same_jump_over_hours_is_allowed() {
        let previous = build(base_raw());
        let mut raw = base_raw();
        raw.timestamp = (base() + Duration::hours(3)).to_rfc3339();
        raw.temperature = Some(40.0);
        let current = build(raw);

        let ctx = CheckContext {
            previous: Some(&previous),
        };
        let results = checker().check(&current, &ctx);
        assert!(results
            .iter()
            .all(|r| r.reason != Some(Reason::ImplausibleRateOfChange)));
    }

    #[test]
    fn test_rapid_pressure_drop_is_flagged() {
        let previous = build(base_raw());
        let mut raw = base_raw();
        raw.timestamp = (base() + Duration::minutes(10)).to_rfc3339();
        raw.pressure = Some(990.0);
        let current = build(raw);

        let ctx = CheckContext {
            previous: Some(&previous),
        };
        let results = checker().check(&current, &ctx);
        assert!(results.iter().any(|r| r.field == Field::Pressure
            && r.reason == Some(Reason::ImplausibleRateOfChange)));
    }

    #[test]
    fn test_custom_rule_is_appended() {
        #[derive(Debug)]
        struct AlwaysFails;

        impl ConsistencyRule for AlwaysFails {
            fn name(&self) -> &'static str {
                "always_fails"
            }

            fn check(&self, _: &Reading, _: &CheckContext<'_>) -> Option<FieldCheckResult> {
                Some(FieldCheckResult::fail(
                    Field::WindSpeed,
                    CheckKind::Consistency,
                    Severity::Soft,
                    Reason::SuspiciousTemperatureHumidity,
                ))
            }
        }

        let checker = checker().with_rule(Box::new(AlwaysFails));
        assert_eq!(checker.rule_names().last(), Some(&"always_fails"));

        let results = checker.check(&build(base_raw()), &CheckContext::default());
        assert_eq!(results.last().map(|r| r.field), Some(Field::WindSpeed));
    }

    fn checker() -> ConsistencyChecker {
        ConsistencyChecker::from_config(&QualityConfig::default())
    }

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn base_raw() -> RawReading {
        RawReading {
            city: "Berlin".to_string(),
            timestamp: base().to_rfc3339(),
            temperature: Some(22.0),
            humidity: Some(50.0),
            pressure: Some(1013.0),
            wind_speed: Some(3.0),
            weather_condition: Some("clear".to_string()),
            dew_point: None,
        }
    }

    fn build(raw: RawReading) -> Reading {
        Reading::from_raw_at(raw, base() + Duration::days(1), Duration::minutes(5)).unwrap()
    }
}

//! Engine configuration.
//!
//! Every threshold the checks use lives here so tests can inject extreme
//! values. Stored on disk as a JSON object; any omitted key takes its
//! default:
//! ```json
//! {
//!   "anomaly_k": 2.5,
//!   "dimension_weights": { "completeness": 0.25, "accuracy": 0.35,
//!                          "freshness": 0.15, "consistency": 0.25 }
//! }
//! ```

use anyhow::Result;
use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;
use crate::reading::{DEFAULT_CLOCK_SKEW_MINUTES, Field};

const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Inclusive `[min, max]` bound for one field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

impl Bounds {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Physical bounds for each numeric field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RangeBounds {
    pub temperature: Bounds,
    pub humidity: Bounds,
    pub pressure: Bounds,
    pub wind_speed: Bounds,
}

impl RangeBounds {
    pub fn get(&self, field: Field) -> Option<Bounds> {
        match field {
            Field::Temperature => Some(self.temperature),
            Field::Humidity => Some(self.humidity),
            Field::Pressure => Some(self.pressure),
            Field::WindSpeed => Some(self.wind_speed),
            _ => None,
        }
    }
}

impl Default for RangeBounds {
    fn default() -> Self {
        Self {
            temperature: Bounds::new(-90.0, 60.0),
            humidity: Bounds::new(0.0, 100.0),
            pressure: Bounds::new(870.0, 1085.0),
            wind_speed: Bounds::new(0.0, 150.0),
        }
    }
}

/// Weight of each quality dimension in the overall score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DimensionWeights {
    pub completeness: f64,
    pub accuracy: f64,
    pub freshness: f64,
    pub consistency: f64,
}

impl DimensionWeights {
    pub fn sum(&self) -> f64 {
        self.completeness + self.accuracy + self.freshness + self.consistency
    }
}

impl Default for DimensionWeights {
    fn default() -> Self {
        Self {
            completeness: 0.25,
            accuracy: 0.35,
            freshness: 0.15,
            consistency: 0.25,
        }
    }
}

/// Relative weight of out-of-range and anomaly failures in the accuracy score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccuracyWeights {
    pub out_of_range: f64,
    pub anomaly: f64,
}

impl Default for AccuracyWeights {
    fn default() -> Self {
        Self {
            out_of_range: 1.0,
            anomaly: 1.0,
        }
    }
}

/// Weight of hard violations and soft warnings in the consistency score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeverityWeights {
    pub hard: f64,
    pub soft: f64,
}

impl Default for SeverityWeights {
    fn default() -> Self {
        Self {
            hard: 1.0,
            soft: 0.5,
        }
    }
}

/// Largest change allowed between consecutive readings of one city.
///
/// A delta is allowed up to `*_max_delta` within `window_minutes`; over longer
/// gaps the allowance grows proportionally.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateOfChange {
    pub window_minutes: f64,
    pub temperature_max_delta: f64,
    pub pressure_max_delta: f64,
}

impl Default for RateOfChange {
    fn default() -> Self {
        Self {
            window_minutes: 10.0,
            temperature_max_delta: 15.0,
            pressure_max_delta: 20.0,
        }
    }
}

/// Thresholds for the hot-and-dry soft warning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HotDry {
    pub min_temperature: f64,
    pub max_humidity: f64,
}

impl Default for HotDry {
    fn default() -> Self {
        Self {
            min_temperature: 35.0,
            max_humidity: 10.0,
        }
    }
}

/// Full engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    pub range_bounds: RangeBounds,
    pub anomaly_k: f64,
    pub anomaly_min_samples: usize,
    /// Floor for the history's standard deviation; 0 flags any change
    /// against a constant history.
    pub anomaly_min_stddev: f64,
    pub history_window_size: usize,
    pub freshness_fresh_minutes: f64,
    pub freshness_stale_minutes: f64,
    pub clock_skew_tolerance_minutes: i64,
    pub dimension_weights: DimensionWeights,
    pub accuracy_weights: AccuracyWeights,
    pub severity_weights: SeverityWeights,
    pub rate_of_change: RateOfChange,
    pub snow_max_temperature: f64,
    pub clear_max_humidity: f64,
    pub hot_dry: HotDry,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            range_bounds: RangeBounds::default(),
            anomaly_k: 3.0,
            anomaly_min_samples: 10,
            anomaly_min_stddev: 0.0,
            history_window_size: 100,
            freshness_fresh_minutes: 10.0,
            freshness_stale_minutes: 60.0,
            clock_skew_tolerance_minutes: DEFAULT_CLOCK_SKEW_MINUTES,
            dimension_weights: DimensionWeights::default(),
            accuracy_weights: AccuracyWeights::default(),
            severity_weights: SeverityWeights::default(),
            rate_of_change: RateOfChange::default(),
            snow_max_temperature: 10.0,
            clear_max_humidity: 95.0,
            hot_dry: HotDry::default(),
        }
    }
}

impl QualityConfig {
    /// Loads the config from a JSON file at `path`.
    ///
    /// The result is not validated here; [`crate::engine::QualityEngine::new`]
    /// does that.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: QualityConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn clock_skew_tolerance(&self) -> Duration {
        Duration::minutes(self.clock_skew_tolerance_minutes)
    }

    /// Checks every invariant the engine relies on.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let w = &self.dimension_weights;
        for (name, value) in [
            ("completeness", w.completeness),
            ("accuracy", w.accuracy),
            ("freshness", w.freshness),
            ("consistency", w.consistency),
            ("accuracy_weights.out_of_range", self.accuracy_weights.out_of_range),
            ("accuracy_weights.anomaly", self.accuracy_weights.anomaly),
            ("severity_weights.soft", self.severity_weights.soft),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigurationError::NegativeWeight { name, value });
            }
        }

        let sum = w.sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(ConfigurationError::WeightsDoNotSumToOne { sum });
        }

        positive("severity_weights.hard", self.severity_weights.hard)?;
        if self.severity_weights.soft > self.severity_weights.hard {
            return Err(ConfigurationError::InvalidThreshold {
                name: "severity_weights.soft",
                value: self.severity_weights.soft,
            });
        }
        positive(
            "accuracy_weights",
            self.accuracy_weights
                .out_of_range
                .max(self.accuracy_weights.anomaly),
        )?;
        positive("anomaly_k", self.anomaly_k)?;
        if !self.anomaly_min_stddev.is_finite() || self.anomaly_min_stddev < 0.0 {
            return Err(ConfigurationError::InvalidThreshold {
                name: "anomaly_min_stddev",
                value: self.anomaly_min_stddev,
            });
        }
        positive("rate_of_change.window_minutes", self.rate_of_change.window_minutes)?;
        positive(
            "rate_of_change.temperature_max_delta",
            self.rate_of_change.temperature_max_delta,
        )?;
        positive(
            "rate_of_change.pressure_max_delta",
            self.rate_of_change.pressure_max_delta,
        )?;

        if self.anomaly_min_samples < 2 {
            return Err(ConfigurationError::InvalidThreshold {
                name: "anomaly_min_samples",
                value: self.anomaly_min_samples as f64,
            });
        }
        if self.history_window_size < self.anomaly_min_samples {
            return Err(ConfigurationError::WindowTooSmall {
                window: self.history_window_size,
                min_samples: self.anomaly_min_samples,
            });
        }

        if !self.freshness_fresh_minutes.is_finite() || self.freshness_fresh_minutes < 0.0 {
            return Err(ConfigurationError::InvalidThreshold {
                name: "freshness_fresh_minutes",
                value: self.freshness_fresh_minutes,
            });
        }
        if !self.freshness_stale_minutes.is_finite()
            || self.freshness_stale_minutes <= self.freshness_fresh_minutes
        {
            return Err(ConfigurationError::InvalidThreshold {
                name: "freshness_stale_minutes",
                value: self.freshness_stale_minutes,
            });
        }

        if self.clock_skew_tolerance_minutes < 0 {
            return Err(ConfigurationError::InvalidThreshold {
                name: "clock_skew_tolerance_minutes",
                value: self.clock_skew_tolerance_minutes as f64,
            });
        }

        for field in Field::NUMERIC {
            if let Some(b) = self.range_bounds.get(field) {
                if !b.min.is_finite() || !b.max.is_finite() || b.min > b.max {
                    return Err(ConfigurationError::InvalidBounds {
                        field: field.as_str(),
                        min: b.min,
                        max: b.max,
                    });
                }
            }
        }

        Ok(())
    }
}

fn positive(name: &'static str, value: f64) -> Result<(), ConfigurationError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigurationError::InvalidThreshold { name, value })
    }
}

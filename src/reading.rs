//! The reading model shared by every check.
//!
//! [`RawReading`] is the wire form handed over by a collector: strings and
//! optional numbers, no guarantees. [`Reading`] is the validated, immutable
//! form the engine scores. Missing values stay `None` all the way through so
//! that "absent" is never confused with "zero".

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::MalformedReadingError;

/// Default tolerance for timestamps slightly ahead of the evaluating clock.
pub const DEFAULT_CLOCK_SKEW_MINUTES: i64 = 5;

/// A reading exactly as received from a collector.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawReading {
    pub city: String,
    pub timestamp: String,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub humidity: Option<f64>,
    #[serde(default)]
    pub pressure: Option<f64>,
    #[serde(default)]
    pub wind_speed: Option<f64>,
    #[serde(default)]
    pub weather_condition: Option<String>,
    #[serde(default)]
    pub dew_point: Option<f64>,
}

/// Fields a check can refer to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Temperature,
    Humidity,
    Pressure,
    WindSpeed,
    WeatherCondition,
    DewPoint,
    Timestamp,
}

impl Field {
    /// Numeric fields covered by range and anomaly checks, in report order.
    pub const NUMERIC: [Field; 4] = [
        Field::Temperature,
        Field::Humidity,
        Field::Pressure,
        Field::WindSpeed,
    ];

    /// Fields counted by completeness.
    pub const REQUIRED: [Field; 5] = [
        Field::Temperature,
        Field::Humidity,
        Field::Pressure,
        Field::WindSpeed,
        Field::WeatherCondition,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Temperature => "temperature",
            Field::Humidity => "humidity",
            Field::Pressure => "pressure",
            Field::WindSpeed => "wind_speed",
            Field::WeatherCondition => "weather_condition",
            Field::DewPoint => "dew_point",
            Field::Timestamp => "timestamp",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reported weather condition category.
///
/// Accepts the OpenWeatherMap `weather[].main` vocabulary as well as plain
/// adjectives ("cloudy", "rainy"). Anything unrecognised is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeatherCondition {
    Clear,
    Cloudy,
    Rain,
    Drizzle,
    Thunderstorm,
    Snow,
    Fog,
    Other(String),
}

impl WeatherCondition {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "clear" | "sunny" => WeatherCondition::Clear,
            "clouds" | "cloudy" | "overcast" => WeatherCondition::Cloudy,
            "rain" | "rainy" => WeatherCondition::Rain,
            "drizzle" => WeatherCondition::Drizzle,
            "thunderstorm" | "storm" => WeatherCondition::Thunderstorm,
            "snow" | "snowy" => WeatherCondition::Snow,
            "fog" | "mist" | "haze" => WeatherCondition::Fog,
            _ => WeatherCondition::Other(value.trim().to_string()),
        }
    }
}

impl fmt::Display for WeatherCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WeatherCondition::Clear => f.write_str("clear"),
            WeatherCondition::Cloudy => f.write_str("cloudy"),
            WeatherCondition::Rain => f.write_str("rain"),
            WeatherCondition::Drizzle => f.write_str("drizzle"),
            WeatherCondition::Thunderstorm => f.write_str("thunderstorm"),
            WeatherCondition::Snow => f.write_str("snow"),
            WeatherCondition::Fog => f.write_str("fog"),
            WeatherCondition::Other(s) => f.write_str(s),
        }
    }
}

/// A validated observation. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    city: String,
    timestamp: DateTime<Utc>,
    temperature: Option<f64>,
    humidity: Option<f64>,
    pressure: Option<f64>,
    wind_speed: Option<f64>,
    weather_condition: Option<WeatherCondition>,
    dew_point: Option<f64>,
}

impl Reading {
    /// Validates `raw` against the clock `now`.
    ///
    /// Rejects empty cities, unparseable timestamps, non-finite numbers and
    /// timestamps more than `skew_tolerance` ahead of `now`.
    pub fn from_raw_at(
        raw: RawReading,
        now: DateTime<Utc>,
        skew_tolerance: Duration,
    ) -> Result<Self, MalformedReadingError> {
        let city = raw.city.trim();
        if city.is_empty() {
            return Err(MalformedReadingError::EmptyCity);
        }

        let timestamp = parse_timestamp(&raw.timestamp)?;
        if timestamp - now > skew_tolerance {
            return Err(MalformedReadingError::FutureTimestamp {
                timestamp,
                now,
                tolerance_minutes: skew_tolerance.num_minutes(),
            });
        }

        let weather_condition = raw
            .weather_condition
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .map(WeatherCondition::parse);

        Ok(Reading {
            city: city.to_string(),
            timestamp,
            temperature: finite(Field::Temperature, raw.temperature)?,
            humidity: finite(Field::Humidity, raw.humidity)?,
            pressure: finite(Field::Pressure, raw.pressure)?,
            wind_speed: finite(Field::WindSpeed, raw.wind_speed)?,
            weather_condition,
            dew_point: finite(Field::DewPoint, raw.dew_point)?,
        })
    }

    pub fn city(&self) -> &str {
        &self.city
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn temperature(&self) -> Option<f64> {
        self.temperature
    }

    pub fn humidity(&self) -> Option<f64> {
        self.humidity
    }

    pub fn pressure(&self) -> Option<f64> {
        self.pressure
    }

    pub fn wind_speed(&self) -> Option<f64> {
        self.wind_speed
    }

    pub fn weather_condition(&self) -> Option<&WeatherCondition> {
        self.weather_condition.as_ref()
    }

    pub fn dew_point(&self) -> Option<f64> {
        self.dew_point
    }

    /// Numeric value of `field`, `None` when missing or not numeric.
    pub fn value(&self, field: Field) -> Option<f64> {
        match field {
            Field::Temperature => self.temperature,
            Field::Humidity => self.humidity,
            Field::Pressure => self.pressure,
            Field::WindSpeed => self.wind_speed,
            Field::DewPoint => self.dew_point,
            Field::WeatherCondition | Field::Timestamp => None,
        }
    }

    /// Whether `field` carries a value.
    pub fn is_present(&self, field: Field) -> bool {
        match field {
            Field::WeatherCondition => self.weather_condition.is_some(),
            Field::Timestamp => true,
            numeric => self.value(numeric).is_some(),
        }
    }
}

impl TryFrom<RawReading> for Reading {
    type Error = MalformedReadingError;

    fn try_from(raw: RawReading) -> Result<Self, Self::Error> {
        Reading::from_raw_at(
            raw,
            Utc::now(),
            Duration::minutes(DEFAULT_CLOCK_SKEW_MINUTES),
        )
    }
}

/// Parses RFC 3339, falling back to a naive `YYYY-MM-DD[T ]HH:MM:SS` taken as UTC.
fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, MalformedReadingError> {
    let trimmed = value.trim();
    match DateTime::parse_from_rfc3339(trimmed) {
        Ok(ts) => Ok(ts.with_timezone(&Utc)),
        Err(rfc_err) => ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
            .map(|naive| naive.and_utc())
            .ok_or_else(|| MalformedReadingError::UnparseableTimestamp {
                value: value.to_string(),
                reason: rfc_err.to_string(),
            }),
    }
}

fn finite(field: Field, value: Option<f64>) -> Result<Option<f64>, MalformedReadingError> {
    match value {
        Some(v) if !v.is_finite() => Err(MalformedReadingError::NonFiniteValue {
            field: field.as_str(),
        }),
        other => Ok(other),
    }
}

//! Decoders for reading batches and upstream weather payloads.

use anyhow::{Context, Result, anyhow};
use chrono::DateTime;
use serde::Deserialize;

use crate::reading::RawReading;

/// Decodes a batch of readings.
///
/// Accepts a JSON array, a single JSON object, JSON Lines, or CSV with a
/// header row matching [`RawReading`]'s field names. Empty CSV cells are
/// read as missing values.
pub fn parse_readings(bytes: &[u8]) -> Result<Vec<RawReading>> {
    let text = std::str::from_utf8(bytes).context("reading batch is not UTF-8")?;
    let trimmed = text.trim_start();

    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    if trimmed.starts_with('[') {
        return Ok(serde_json::from_str(trimmed)?);
    }

    if trimmed.starts_with('{') {
        return serde_json::Deserializer::from_str(trimmed)
            .into_iter::<RawReading>()
            .map(|r| r.map_err(Into::into))
            .collect();
    }

    let mut rdr = csv::Reader::from_reader(trimmed.as_bytes());
    let mut readings = Vec::new();
    for result in rdr.deserialize() {
        let record: RawReading = result?;
        readings.push(record);
    }
    Ok(readings)
}

#[derive(Deserialize)]
struct OwmResponse {
    dt: Option<i64>,
    main: Option<OwmMain>,
    wind: Option<OwmWind>,
    #[serde(default)]
    weather: Vec<OwmWeather>,
}

#[derive(Deserialize)]
struct OwmMain {
    temp: Option<f64>,
    humidity: Option<f64>,
    pressure: Option<f64>,
}

#[derive(Deserialize)]
struct OwmWind {
    speed: Option<f64>,
}

#[derive(Deserialize)]
struct OwmWeather {
    main: Option<String>,
}

/// Maps an OpenWeatherMap current-weather response (`units=metric`) to a
/// [`RawReading`] for `city`.
///
/// The observation time comes from `dt`. Absent values become missing
/// fields rather than errors.
pub fn parse_openweather(city: &str, bytes: &[u8]) -> Result<RawReading> {
    let resp: OwmResponse = serde_json::from_slice(bytes)?;

    let dt = resp
        .dt
        .ok_or_else(|| anyhow!("OpenWeatherMap response for {} has no dt", city))?;
    let timestamp = DateTime::from_timestamp(dt, 0)
        .ok_or_else(|| anyhow!("OpenWeatherMap dt {} out of range", dt))?;

    let main = resp.main.as_ref();
    Ok(RawReading {
        city: city.to_string(),
        timestamp: timestamp.to_rfc3339(),
        temperature: main.and_then(|m| m.temp),
        humidity: main.and_then(|m| m.humidity),
        pressure: main.and_then(|m| m.pressure),
        wind_speed: resp.wind.and_then(|w| w.speed),
        weather_condition: resp.weather.into_iter().next().and_then(|w| w.main),
        dew_point: None,
    })
}

//! HTTP fetching of reading batches and OpenWeatherMap observations.
//!
//! No retry or backoff: a failed fetch is reported to the caller, which
//! decides whether to try again on its next cycle.

mod basic;
mod client;
mod url_param;

pub use basic::BasicClient;
pub use client::HttpClient;
pub use url_param::UrlParam;

use anyhow::{Result, bail};
use reqwest::Url;

use crate::parser::parse_openweather;
use crate::reading::RawReading;

pub const OPENWEATHER_URL: &str = "https://api.openweathermap.org/data/2.5/weather";

pub async fn fetch_bytes<C: HttpClient>(client: &C, url: &str) -> Result<Vec<u8>> {
    let req = reqwest::Request::new(reqwest::Method::GET, url.parse()?);

    let resp = client.execute(req).await?;
    let status = resp.status();
    if !status.is_success() {
        bail!("GET {} returned {}", url, status);
    }
    Ok(resp.bytes().await?.to_vec())
}

/// Current-weather URL for `city` in metric units. The API key is added by
/// a [`UrlParam`] client.
pub fn openweather_url(base: &str, city: &str) -> Result<Url> {
    Ok(Url::parse_with_params(base, &[("q", city), ("units", "metric")])?)
}

/// Fetches and decodes the current observation for `city`.
#[tracing::instrument(skip(client, base))]
pub async fn fetch_current_weather<C: HttpClient>(
    client: &C,
    base: &str,
    city: &str,
) -> Result<RawReading> {
    let url = openweather_url(base, city)?;
    let bytes = fetch_bytes(client, url.as_str()).await?;
    parse_openweather(city, &bytes)
}

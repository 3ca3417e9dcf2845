//! CLI entry point for the weather quality rater.
//!
//! Provides subcommands for scoring a batch of readings from a file or URL,
//! polling OpenWeatherMap for a set of cities, and summarizing stored reports.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::ffi::OsStr;
use std::path::Path;
use std::sync::Arc;
use tracing::Instrument;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};
use weather_quality_rater::fetch::{
    BasicClient, OPENWEATHER_URL, UrlParam, fetch_bytes, fetch_current_weather,
};
use weather_quality_rater::output::{
    append_record, append_reports, load_records, partition_path, print_json, print_pretty,
};
use weather_quality_rater::parser::parse_readings;
use weather_quality_rater::scoring::summary::{summarize, summarize_reports};
use weather_quality_rater::scoring::types::ReportRecord;
use weather_quality_rater::{QualityConfig, QualityEngine};

#[derive(Parser)]
#[command(name = "weather_quality_rater")]
#[command(about = "Scores the quality of weather observations", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a batch of readings from a file or URL
    Evaluate {
        /// Path to file or URL to fetch (JSON, JSON Lines or CSV)
        #[arg(value_name = "FILE_OR_URL")]
        source: String,

        /// JSON engine configuration; defaults apply when omitted
        #[arg(short, long)]
        config: Option<String>,

        /// CSV file to append reports to
        #[arg(short, long, default_value = "reports.csv")]
        output: String,

        /// Also log each report and the batch summary as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Poll OpenWeatherMap for each city and score every observation
    Collect {
        /// Comma-separated cities (defaults to MONITORED_CITIES)
        #[arg(long)]
        cities: Option<String>,

        /// Directory to write per-city, per-day report CSVs into
        #[arg(short, long, default_value = "reports")]
        output_dir: String,

        /// JSON engine configuration; defaults apply when omitted
        #[arg(short, long)]
        config: Option<String>,

        /// Maximum number of concurrent city fetches
        #[arg(long, default_value_t = 5)]
        concurrency: usize,

        /// Sample rate: query each city every X seconds
        #[arg(short = 'r', long, default_value_t = 300)]
        sample_rate: u64,

        /// Number of samples to collect (0 = infinite)
        #[arg(short = 'n', long, default_value_t = 1)]
        num_samples: usize,
    },
    /// Summarize stored report CSVs per city
    Summarize {
        /// Directory containing city=*/date=*.csv report files
        #[arg(short = 'd', long, default_value = "reports")]
        dir: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path = std::env::var("LOG_FILE_PATH")
        .unwrap_or_else(|_| "logs/weather_quality_rater.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("weather_quality_rater.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Evaluate {
            source,
            config,
            output,
            json,
        } => {
            let engine = build_engine(config.as_deref())?;
            let bytes = fetcher(&source).await?;
            let readings = parse_readings(&bytes)?;
            info!(readings = readings.len(), "Readings loaded");

            let reports = engine.evaluate_batch(readings)?;
            append_reports(&output, &reports)?;

            for report in &reports {
                if json {
                    print_json(report)?;
                } else {
                    print_pretty(report);
                }
            }

            let summary = summarize_reports(&reports, Utc::now());
            info!(
                reports = summary.total_reports(),
                failed = summary.failed_reports(),
                output = %output,
                "Batch written"
            );
            if json {
                print_json(&summary)?;
            }
        }
        Commands::Collect {
            cities,
            output_dir,
            config,
            concurrency,
            sample_rate,
            num_samples,
        } => {
            let cities = cities
                .or_else(|| std::env::var("MONITORED_CITIES").ok())
                .unwrap_or_else(|| "London,New York,Tokyo".to_string());
            let cities: Vec<String> = cities
                .split(',')
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect();

            let engine = build_engine(config.as_deref())?;
            collect(
                engine,
                cities,
                &output_dir,
                concurrency,
                sample_rate,
                num_samples,
            )
            .await?;
        }
        Commands::Summarize { dir } => {
            let records = load_records(&dir)?;
            let summary = summarize(&records, Utc::now());

            for city in summary.cities() {
                info!(
                    city = city.city(),
                    reports = city.reports(),
                    failed = city.failed_reports(),
                    mean_overall = city.mean_overall(),
                    grade = city.grade(),
                    "City summary"
                );
            }
            print_json(&summary)?;
        }
    }

    Ok(())
}

fn build_engine(config_path: Option<&str>) -> Result<QualityEngine> {
    let config = match config_path {
        Some(path) => QualityConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path))?,
        None => QualityConfig::default(),
    };
    Ok(QualityEngine::new(config)?)
}

/// Loads reading data from a local file path or fetches it over HTTP.
#[tracing::instrument(fields(source = %url))]
async fn fetcher(url: &str) -> Result<Vec<u8>> {
    let bytes = if url.starts_with("http") {
        let client = BasicClient::new();
        fetch_bytes(&client, url).await?
    } else {
        std::fs::read(url)?
    };
    Ok(bytes)
}

/// Polls every city concurrently, scoring each observation with one shared
/// engine and appending it to that city's partition for the day.
#[tracing::instrument(skip(engine, cities), fields(cities = cities.len()))]
async fn collect(
    engine: QualityEngine,
    cities: Vec<String>,
    output_dir: &str,
    concurrency: usize,
    sample_rate: u64,
    num_samples: usize,
) -> Result<()> {
    let api_key =
        std::env::var("OPENWEATHER_API_KEY").context("OPENWEATHER_API_KEY must be set")?;
    let base_url = std::env::var("OPENWEATHER_URL").unwrap_or_else(|_| OPENWEATHER_URL.to_string());

    let engine = Arc::new(engine);
    let client = Arc::new(UrlParam::appid(BasicClient::new(), api_key));
    let semaphore = Arc::new(tokio::sync::Semaphore::new(concurrency.max(1)));

    std::fs::create_dir_all(output_dir)?;

    if num_samples == 0 {
        info!(sample_rate, "Sampling infinitely. Press Ctrl+C to stop.");
    } else {
        info!(num_samples, sample_rate, "Starting sample collection");
    }

    let mut sample_count = 0;

    loop {
        // Check if we've reached the sample limit (0 = infinite)
        if num_samples > 0 && sample_count >= num_samples {
            break;
        }
        sample_count += 1;

        info!(sample = sample_count, "Starting sample round");

        let mut tasks = vec![];

        // One task per city per round: a city's readings stay in order.
        for city in &cities {
            let sem = semaphore.clone();
            let engine = engine.clone();
            let client = client.clone();
            let base_url = base_url.clone();
            let output_dir = output_dir.to_string();
            let city = city.clone();

            let city_span = tracing::info_span!("process_city", city = %city);

            let task = tokio::spawn(
                async move {
                    let Ok(_permit) = sem.acquire().await else {
                        return;
                    };

                    let fetch_start = std::time::Instant::now();
                    let raw = match fetch_current_weather(&*client, &base_url, &city).await {
                        Ok(raw) => raw,
                        Err(e) => {
                            error!(error = %e, "Weather fetch failed");
                            return;
                        }
                    };
                    let elapsed = fetch_start.elapsed();
                    if elapsed.as_secs() > 5 {
                        warn!(elapsed_secs = elapsed.as_secs(), "Weather fetch was slow");
                    }
                    debug!("Observation received, scoring");

                    let report = match engine.evaluate(raw) {
                        Ok(report) => report,
                        Err(e) => {
                            error!(error = %e, "Observation rejected");
                            return;
                        }
                    };

                    let path = partition_path(&output_dir, report.city(), report.evaluated_at());
                    if let Some(dir) = Path::new(&path).parent() {
                        if let Err(e) = std::fs::create_dir_all(dir) {
                            error!(dir = %dir.display(), error = %e, "Failed to create city directory");
                            return;
                        }
                    }

                    if let Err(e) = append_record(&path, &ReportRecord::from(&report)) {
                        error!(error = %e, "Failed to write report");
                    } else {
                        info!(
                            overall = report.overall(),
                            grade = report.grade(),
                            status = %report.status(),
                            "Observation scored"
                        );
                    }
                }
                .instrument(city_span),
            );

            tasks.push(task);
        }

        // Wait for all tasks to complete
        for task in tasks {
            let _ = task.await;
        }

        // If not the last sample, wait before next iteration
        if num_samples == 0 || sample_count < num_samples {
            info!(sample_rate, "Waiting before next sample");
            tokio::time::sleep(tokio::time::Duration::from_secs(sample_rate)).await;
        }
    }

    info!(output_dir, "Finished collecting");
    Ok(())
}

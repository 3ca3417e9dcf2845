//! Output formatting and persistence for quality reports.
//!
//! Supports pretty-printing, JSON serialization, CSV append and reading the
//! CSVs back from a `city=<slug>/date=<YYYY-MM-DD>.csv` tree.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::scoring::types::{QualityReport, ReportRecord};
use csv::WriterBuilder;
use std::fs::{self, File, OpenOptions};
use std::path::Path;

/// Logs a report using Rust's debug pretty-print format.
pub fn print_pretty(report: &QualityReport) {
    debug!("{:#?}", report);
}

/// Logs any serializable value as pretty-printed JSON.
pub fn print_json(value: &impl Serialize) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Appends a [`ReportRecord`] as a row to a CSV file.
///
/// Creates the file with headers if it does not already exist.
pub fn append_record(path: &str, record: &ReportRecord) -> Result<()> {
    let file_exists = Path::new(path).exists();
    debug!(path, file_exists, "Appending CSV record");

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists) // IMPORTANT when appending
        .from_writer(file);

    writer.serialize(record)?;
    writer.flush()?;

    Ok(())
}

/// Appends every report in order.
pub fn append_reports(path: &str, reports: &[QualityReport]) -> Result<()> {
    for report in reports {
        append_record(path, &ReportRecord::from(report))?;
    }
    Ok(())
}

/// Lower-cased city name with anything but ASCII alphanumerics replaced by `_`.
pub fn city_slug(city: &str) -> String {
    city.trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// `<base_dir>/city=<slug>/date=<YYYY-MM-DD>.csv` for a report evaluated at `at`.
pub fn partition_path(base_dir: &str, city: &str, at: DateTime<Utc>) -> String {
    format!(
        "{}/city={}/date={}.csv",
        base_dir,
        city_slug(city),
        at.format("%Y-%m-%d")
    )
}

/// Reads every row of one report CSV.
pub fn read_records(path: &Path) -> Result<Vec<ReportRecord>> {
    let file = File::open(path)?;
    let mut rdr = csv::Reader::from_reader(file);
    let mut rows = Vec::new();

    for result in rdr.deserialize() {
        let record: ReportRecord = result?;
        rows.push(record);
    }

    Ok(rows)
}

/// Reads every CSV under `city=*` directories of `base_dir`.
pub fn load_records(base_dir: &str) -> Result<Vec<ReportRecord>> {
    let mut rows = Vec::new();

    for entry in fs::read_dir(base_dir)? {
        let entry = entry?;
        let is_city_dir = entry.file_type()?.is_dir()
            && entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with("city="));
        if !is_city_dir {
            continue;
        }

        for file in fs::read_dir(entry.path())? {
            let path = file?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("csv") {
                rows.extend(read_records(&path)?);
            }
        }
    }

    Ok(rows)
}

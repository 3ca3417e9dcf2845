pub mod checks;
pub mod config;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod history;
pub mod output;
pub mod parser;
pub mod reading;
pub mod scoring;

pub use config::QualityConfig;
pub use engine::QualityEngine;
pub use error::{ConfigurationError, MalformedReadingError, QualityError};
pub use reading::{RawReading, Reading};
pub use scoring::types::QualityReport;

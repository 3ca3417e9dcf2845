//! Score aggregation and reporting.
//!
//! This module turns per-check results into dimension scores, an overall
//! weighted score and a letter grade, and rolls reports up per city.

pub mod aggregate;
pub mod grade;
pub mod summary;
pub mod types;
pub mod utility;

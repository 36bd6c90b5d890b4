#![forbid(unsafe_code)]

//! Core domain model and business logic for CMAS (Childhood Myositis
//! Assessment Scale) tracking.
//!
//! This crate provides:
//! - Domain types (exercise scores, measurements, severity bands)
//! - Score aggregation and interpretation
//! - Trend and summary statistics
//! - Persistence (WAL, CSV archive, patient registry)

pub mod types;
pub mod error;
pub mod catalog;
pub mod config;
pub mod logging;
pub mod scoring;
pub mod interpretation;
pub mod trend;
pub mod submission;
pub mod assessment;
pub mod wal;
pub mod csv_rollup;
pub mod history;
pub mod registry;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use catalog::get_default_catalog;
pub use config::Config;
pub use scoring::sum_scores;
pub use interpretation::{interpret, percentage};
pub use trend::{classify_trend, summarize, HistoryStats};
pub use submission::MeasurementSubmission;
pub use assessment::{assess, record, AssessedMeasurement};
pub use wal::{JsonlSink, MeasurementSink};
pub use history::{load_patient_history, DateRange};
pub use registry::PatientRegistry;

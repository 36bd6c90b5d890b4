//! Turning a submission into a scored, storable measurement.
//!
//! Flow:
//! 1. Resolve exercise names and maxima against the catalog
//! 2. Validate items, ranges and exercise count, sum the total
//! 3. Derive percentage (out of 52) and severity band
//! 4. Hand the immutable `Measurement` to a sink

use crate::catalog::get_default_catalog;
use crate::interpretation::{interpret, percentage};
use crate::submission::MeasurementSubmission;
use crate::wal::MeasurementSink;
use crate::{AssessmentSummary, Config, Error, Measurement, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// A validated measurement together with its interpretation
#[derive(Clone, Debug, Serialize)]
pub struct AssessedMeasurement {
    pub measurement: Measurement,
    pub summary: AssessmentSummary,
}

/// Interpret a total against the maximum achievable score
pub fn summarize_total(total_score: f64, max_score: f64) -> Result<AssessmentSummary> {
    let severity = interpret(total_score);
    Ok(AssessmentSummary {
        total_score,
        max_score,
        percentage: percentage(total_score, max_score)?,
        severity,
        interpretation: severity.label().to_string(),
    })
}

/// Validate and score a submission
///
/// `now` is used when the submission carries no measurement date.
pub fn assess(
    submission: &MeasurementSubmission,
    config: &Config,
    now: DateTime<Utc>,
) -> Result<AssessedMeasurement> {
    let patient_id = submission.patient_id.trim();
    if patient_id.is_empty() {
        return Err(Error::Validation("patient_id is required".into()));
    }

    let catalog = get_default_catalog();
    let exercises = submission.exercise_scores();
    let total_score = crate::scoring::validate_measurement(
        &exercises,
        catalog,
        config.assessment.required_exercises,
    )?;
    let summary = summarize_total(total_score, catalog.max_total())?;

    let measurement = Measurement {
        id: Uuid::new_v4(),
        patient_id: patient_id.to_string(),
        exercises,
        total_score,
        recorded_at: submission.recorded_at()?.unwrap_or(now),
        notes: submission
            .notes
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(String::from),
    };

    Ok(AssessedMeasurement {
        measurement,
        summary,
    })
}

/// Assess a submission and persist it through the given sink
pub fn record(
    submission: &MeasurementSubmission,
    config: &Config,
    sink: &mut dyn MeasurementSink,
    now: DateTime<Utc>,
) -> Result<AssessedMeasurement> {
    let assessed = assess(submission, config, now)?;
    sink.append(&assessed.measurement)?;

    tracing::info!(
        "Recorded measurement {} for {}: {} ({})",
        assessed.measurement.id,
        assessed.measurement.patient_id,
        assessed.summary.total_score,
        assessed.summary.interpretation
    );

    Ok(assessed)
}

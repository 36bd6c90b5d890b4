//! Measurement submissions as supplied by a caller.
//!
//! A submission is the raw `{ patient_id, exercises, notes, measurement_date }`
//! payload. Exercise names resolve to catalog items by display name or id,
//! and an omitted maximum is taken from the matching item.

use crate::catalog::{get_default_catalog, STANDARD_MAX_SCORE};
use crate::{Error, ExerciseScore, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use std::path::Path;

/// One exercise entry as submitted
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct ExerciseEntry {
    pub name: String,
    pub score: f64,
    #[serde(default, alias = "maxScore")]
    pub max_score: Option<f64>,
}

/// A measurement submission
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct MeasurementSubmission {
    #[serde(alias = "patientId")]
    pub patient_id: String,
    pub exercises: Vec<ExerciseEntry>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default, alias = "measurementDate")]
    pub measurement_date: Option<String>,
}

impl MeasurementSubmission {
    /// Build a submission from a positional score list in catalog order
    pub fn from_score_list(patient_id: impl Into<String>, scores: &[f64]) -> Result<Self> {
        let exercises = get_default_catalog()
            .scores_from_list(scores)?
            .into_iter()
            .map(|e| ExerciseEntry {
                name: e.name,
                score: e.score,
                max_score: Some(e.max_score),
            })
            .collect();

        Ok(Self {
            patient_id: patient_id.into(),
            exercises,
            notes: None,
            measurement_date: None,
        })
    }

    /// Resolve entries into exercise scores
    ///
    /// Known items take the catalog's display name, and its maximum when
    /// none was submitted. Unknown names pass through for validation to
    /// reject.
    pub fn exercise_scores(&self) -> Vec<ExerciseScore> {
        let catalog = get_default_catalog();
        self.exercises
            .iter()
            .map(|entry| match catalog.find(&entry.name) {
                Some(def) => ExerciseScore::new(
                    def.name,
                    entry.score,
                    entry.max_score.unwrap_or(def.max_score),
                ),
                None => ExerciseScore::new(
                    entry.name.trim(),
                    entry.score,
                    entry.max_score.unwrap_or(STANDARD_MAX_SCORE),
                ),
            })
            .collect()
    }

    /// Timestamp of the measurement, if the caller supplied one
    pub fn recorded_at(&self) -> Result<Option<DateTime<Utc>>> {
        self.measurement_date
            .as_deref()
            .map(parse_timestamp)
            .transpose()
    }
}

/// Parse an RFC 3339 timestamp or a plain `YYYY-MM-DD` date (midnight UTC)
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    parse_date(s).map(|d| d.and_time(chrono::NaiveTime::MIN).and_utc())
}

/// Parse a `YYYY-MM-DD` date
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|e| Error::Validation(format!("invalid date '{}': {}", s, e)))
}

/// Parse a comma-separated score list such as `4,3,4,2.5`
pub fn parse_score_list(s: &str) -> Result<Vec<f64>> {
    s.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<f64>()
                .map_err(|_| Error::Validation(format!("invalid score '{}'", part)))
        })
        .collect()
}

/// Load a submission from a JSON file
///
/// Unlike stored data, a malformed submission is an error for the caller.
pub fn load_submission(path: &Path) -> Result<MeasurementSubmission> {
    let contents = std::fs::read_to_string(path)?;
    let submission: MeasurementSubmission = serde_json::from_str(&contents)
        .map_err(|e| Error::Validation(format!("malformed submission {:?}: {}", path, e)))?;

    tracing::debug!(
        "Loaded submission for {} with {} exercises",
        submission.patient_id,
        submission.exercises.len()
    );
    Ok(submission)
}

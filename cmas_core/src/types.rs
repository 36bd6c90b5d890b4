//! Core domain types for CMAS tracking.
//!
//! This module defines the fundamental types used throughout the system:
//! - Exercise scores and complete measurements
//! - Severity bands and trend directions
//! - Patient profiles and roles

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Exercise and Measurement Types
// ============================================================================

/// Score for one CMAS exercise item
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ExerciseScore {
    pub name: String,
    pub score: f64,
    #[serde(default = "default_max_score", alias = "maxScore")]
    pub max_score: f64,
}

fn default_max_score() -> f64 {
    crate::catalog::STANDARD_MAX_SCORE
}

impl ExerciseScore {
    pub fn new(name: impl Into<String>, score: f64, max_score: f64) -> Self {
        Self {
            name: name.into(),
            score,
            max_score,
        }
    }
}

/// A recorded, complete CMAS assessment
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Measurement {
    pub id: Uuid,
    pub patient_id: String,
    pub exercises: Vec<ExerciseScore>,
    pub total_score: f64,
    pub recorded_at: DateTime<Utc>,
    #[serde(default)]
    pub notes: Option<String>,
}

// ============================================================================
// Interpretation Types
// ============================================================================

/// Severity classification of a total CMAS score, lowest first
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SeverityBand {
    VerySevereImpairment,
    SevereImpairment,
    ModerateImpairment,
    MildImpairment,
    Normal,
}

impl SeverityBand {
    /// Human-readable label as shown to clinicians
    pub fn label(self) -> &'static str {
        match self {
            SeverityBand::Normal => "Normal",
            SeverityBand::MildImpairment => "Mild impairment",
            SeverityBand::ModerateImpairment => "Moderate impairment",
            SeverityBand::SevereImpairment => "Severe impairment",
            SeverityBand::VerySevereImpairment => "Very severe impairment",
        }
    }
}

impl fmt::Display for SeverityBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Direction of a patient's scores over time
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Improving,
    Stable,
    Declining,
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Trend::Improving => "improving",
            Trend::Stable => "stable",
            Trend::Declining => "declining",
        };
        f.write_str(s)
    }
}

/// Derived view of a scored measurement, handed back to the caller
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AssessmentSummary {
    pub total_score: f64,
    pub max_score: f64,
    pub percentage: u32,
    pub severity: SeverityBand,
    pub interpretation: String,
}

// ============================================================================
// Patient Types
// ============================================================================

/// Role of a registered portal user
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    Patient,
    Doctor,
    Admin,
}

/// A registered patient (or clinician) profile. Carries no credentials.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PatientProfile {
    pub patient_id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub diagnosis_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

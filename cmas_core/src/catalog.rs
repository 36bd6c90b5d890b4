//! Standard catalog of CMAS exercise items.
//!
//! The Childhood Myositis Assessment Scale has 14 items, each scored 0-4.
//! A complete assessment is reported out of 52, so the best possible
//! item scores cannot all be reached at once.

use crate::ExerciseScore;
use once_cell::sync::Lazy;
use std::collections::HashSet;

/// Maximum score of each standard CMAS item
pub const STANDARD_MAX_SCORE: f64 = 4.0;

/// Number of items in a complete assessment
pub const STANDARD_EXERCISE_COUNT: usize = 14;

/// Ceiling of a complete assessment's total, and its percentage denominator
pub const CMAS_MAX_TOTAL: f64 = 52.0;

/// A single assessment item
#[derive(Clone, Debug, PartialEq)]
pub struct ExerciseDefinition {
    pub id: &'static str,
    pub name: &'static str,
    pub max_score: f64,
}

/// The ordered list of assessment items
#[derive(Clone, Debug)]
pub struct Catalog {
    pub exercises: Vec<ExerciseDefinition>,
    /// Highest total a complete assessment may reach
    pub max_total: f64,
}

/// Cached default catalog - built once and reused across all operations
static DEFAULT_CATALOG: Lazy<Catalog> = Lazy::new(build_default_catalog);

/// Get a reference to the cached default catalog
pub fn get_default_catalog() -> &'static Catalog {
    &DEFAULT_CATALOG
}

/// Builds the standard 14-item catalog in assessment order
pub fn build_default_catalog() -> Catalog {
    const ITEMS: [(&str, &str); STANDARD_EXERCISE_COUNT] = [
        ("head_lift", "Head lift"),
        ("leg_lift", "Leg lift"),
        ("straight_leg_raise", "Straight leg raise"),
        ("supine_to_sit", "Supine to sit"),
        ("sit_ups", "Sit-ups"),
        ("prone_head_lift", "Prone head lift"),
        ("hands_to_head", "Hands to head"),
        ("hands_on_table", "Hands on table"),
        ("arms_raised", "Arms raised"),
        ("stand_from_floor", "Stand from floor"),
        ("heel_raise", "Heel raise"),
        ("pick_up_object", "Pick up object"),
        ("stand_on_one_leg", "Stand on one leg"),
        ("running", "Running"),
    ];

    Catalog {
        exercises: ITEMS
            .iter()
            .map(|&(id, name)| ExerciseDefinition {
                id,
                name,
                max_score: STANDARD_MAX_SCORE,
            })
            .collect(),
        max_total: CMAS_MAX_TOTAL,
    }
}

impl Catalog {
    /// Look up an item by display name or id, ignoring case
    pub fn find(&self, name: &str) -> Option<&ExerciseDefinition> {
        let needle = name.trim();
        self.exercises
            .iter()
            .find(|e| e.name.eq_ignore_ascii_case(needle) || e.id.eq_ignore_ascii_case(needle))
    }

    /// Position of an item in assessment order
    pub fn position(&self, name: &str) -> Option<usize> {
        let def = self.find(name)?;
        self.exercises.iter().position(|e| e.id == def.id)
    }

    /// Highest total a complete assessment may reach
    pub fn max_total(&self) -> f64 {
        self.max_total
    }

    /// Map a positional score list onto the catalog items
    ///
    /// A short list maps onto the leading items; completeness is left to
    /// measurement validation. A list longer than the catalog is rejected.
    pub fn scores_from_list(&self, scores: &[f64]) -> crate::Result<Vec<ExerciseScore>> {
        if scores.len() > self.exercises.len() {
            return Err(crate::Error::ExerciseCount {
                required: self.exercises.len(),
                actual: scores.len(),
            });
        }

        Ok(self
            .exercises
            .iter()
            .zip(scores)
            .map(|(def, &score)| ExerciseScore::new(def.name, score, def.max_score))
            .collect())
    }

    /// Validate catalog integrity, returning every problem found
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        let mut seen_ids = HashSet::new();

        for def in &self.exercises {
            if !seen_ids.insert(def.id) {
                errors.push(format!("Duplicate exercise id: {}", def.id));
            }
            if def.name.trim().is_empty() {
                errors.push(format!("Exercise {} has an empty name", def.id));
            }
            if !(def.max_score > 0.0) {
                errors.push(format!(
                    "Exercise {} has non-positive max score {}",
                    def.id, def.max_score
                ));
            }
        }

        if self.exercises.is_empty() {
            errors.push("Catalog has no exercises".to_string());
        }

        let item_sum: f64 = self.exercises.iter().map(|e| e.max_score).sum();
        if !(self.max_total > 0.0) || self.max_total > item_sum {
            errors.push(format!(
                "Catalog max total {} must be positive and at most {}",
                self.max_total, item_sum
            ));
        }

        errors
    }
}

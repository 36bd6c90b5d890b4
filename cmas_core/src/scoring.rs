//! Score aggregation for CMAS measurements.
//!
//! Validates per-exercise scores against their maxima and sums them into a
//! total. Partial (fractional) scores are allowed.

use crate::catalog::Catalog;
use crate::{Error, ExerciseScore, Result};
use std::collections::HashSet;

/// Check a single exercise score against its range
pub fn validate_exercise(exercise: &ExerciseScore) -> Result<()> {
    let in_range = exercise.score.is_finite()
        && exercise.max_score.is_finite()
        && exercise.score >= 0.0
        && exercise.score <= exercise.max_score;

    if in_range {
        Ok(())
    } else {
        Err(Error::InvalidScore {
            exercise: exercise.name.clone(),
            score: exercise.score,
            max_score: exercise.max_score,
        })
    }
}

/// Sum exercise scores into a total
///
/// Fails on the first exercise whose score lies outside `0..=max_score`.
pub fn sum_scores(exercises: &[ExerciseScore]) -> Result<f64> {
    let mut total = 0.0;
    for exercise in exercises {
        validate_exercise(exercise)?;
        total += exercise.score;
    }
    Ok(total)
}

/// Validate a complete measurement against the catalog and return its total
///
/// Every entry must name a distinct catalog item (by display name or id)
/// and carry that item's maximum. Score ranges are checked before the
/// exercise count, so an out-of-range entry is reported even when the set
/// is also incomplete. The total may not exceed the catalog ceiling.
pub fn validate_measurement(
    exercises: &[ExerciseScore],
    catalog: &Catalog,
    required: usize,
) -> Result<f64> {
    let mut seen = HashSet::new();
    for exercise in exercises {
        let name = exercise.name.trim();
        if name.is_empty() {
            return Err(Error::Validation("exercise name must not be empty".into()));
        }
        let def = catalog
            .find(name)
            .ok_or_else(|| Error::Validation(format!("unknown exercise '{}'", name)))?;
        if !seen.insert(def.id) {
            return Err(Error::Validation(format!("duplicate exercise '{}'", def.name)));
        }
        if exercise.max_score != def.max_score {
            return Err(Error::Validation(format!(
                "maximum score for '{}' must be {}, got {}",
                def.name, def.max_score, exercise.max_score
            )));
        }
    }

    let total = sum_scores(exercises)?;

    if exercises.len() != required {
        return Err(Error::ExerciseCount {
            required,
            actual: exercises.len(),
        });
    }

    if total > catalog.max_total() {
        return Err(Error::Validation(format!(
            "total score {} exceeds the CMAS maximum of {}",
            total,
            catalog.max_total()
        )));
    }

    Ok(total)
}

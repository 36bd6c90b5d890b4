//! Trend and summary statistics over a patient's measurement history.
//!
//! Series are expected oldest first. The trend compares the latest total
//! against a baseline built from the oldest measurements:
//! - Baseline: mean of the first `baseline_window` totals
//! - Improving: latest exceeds the baseline by more than `tolerance`
//! - Declining: latest falls below it by more than `tolerance`

use crate::config::TrendConfig;
use crate::{catalog::get_default_catalog, Measurement, Trend};
use serde::{Deserialize, Serialize};

/// Aggregate statistics for a series of totals
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct HistoryStats {
    pub total_measurements: usize,
    pub average_score: f64,
    pub highest_score: f64,
    pub lowest_score: f64,
    pub latest_score: f64,
    /// Percent change from the first to the latest total
    pub improvement_rate: Option<f64>,
    pub trend: Trend,
}

/// Per-exercise aggregate across several measurements
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ExerciseBreakdown {
    pub name: String,
    pub count: usize,
    pub average_score: f64,
    pub lowest_score: f64,
    pub highest_score: f64,
    pub max_score: f64,
}

/// Classify the direction of a time-ordered series
pub fn classify_trend(series: &[f64], policy: &TrendConfig) -> Trend {
    let Some(&latest) = series.last() else {
        return Trend::Stable;
    };
    if series.len() < 2 {
        return Trend::Stable;
    }

    // The latest value never counts towards its own baseline
    let window = policy.baseline_window.clamp(1, series.len() - 1);
    let baseline = mean(&series[..window]);
    let delta = latest - baseline;

    if delta > policy.tolerance {
        Trend::Improving
    } else if -delta > policy.tolerance {
        Trend::Declining
    } else {
        Trend::Stable
    }
}

/// Summarize a time-ordered series of totals
///
/// Returns `None` for an empty series.
pub fn summarize(series: &[f64], policy: &TrendConfig) -> Option<HistoryStats> {
    let (&first, &latest) = (series.first()?, series.last()?);

    let highest = series.iter().copied().fold(f64::MIN, f64::max);
    let lowest = series.iter().copied().fold(f64::MAX, f64::min);

    let improvement_rate = if series.len() > 1 && first != 0.0 {
        Some((latest - first) / first * 100.0)
    } else {
        None
    };

    Some(HistoryStats {
        total_measurements: series.len(),
        average_score: mean(series),
        highest_score: highest,
        lowest_score: lowest,
        latest_score: latest,
        improvement_rate,
        trend: classify_trend(series, policy),
    })
}

/// Summarize measurements, which must already be sorted oldest first
pub fn summarize_measurements(
    measurements: &[Measurement],
    policy: &TrendConfig,
) -> Option<HistoryStats> {
    let series: Vec<f64> = measurements.iter().map(|m| m.total_score).collect();
    summarize(&series, policy)
}

/// Per-exercise statistics, catalog items first in assessment order
pub fn exercise_breakdown(measurements: &[Measurement]) -> Vec<ExerciseBreakdown> {
    let catalog = get_default_catalog();
    let mut rows: Vec<(ExerciseBreakdown, f64)> = Vec::new();

    for exercise in measurements.iter().flat_map(|m| &m.exercises) {
        let key = catalog
            .find(&exercise.name)
            .map(|d| d.name.to_string())
            .unwrap_or_else(|| exercise.name.trim().to_string());

        match rows.iter_mut().find(|(row, _)| row.name == key) {
            Some((row, sum)) => {
                row.count += 1;
                *sum += exercise.score;
                row.lowest_score = row.lowest_score.min(exercise.score);
                row.highest_score = row.highest_score.max(exercise.score);
                row.max_score = row.max_score.max(exercise.max_score);
            }
            None => rows.push((
                ExerciseBreakdown {
                    name: key,
                    count: 1,
                    average_score: 0.0,
                    lowest_score: exercise.score,
                    highest_score: exercise.score,
                    max_score: exercise.max_score,
                },
                exercise.score,
            )),
        }
    }

    let mut breakdown: Vec<ExerciseBreakdown> = rows
        .into_iter()
        .map(|(mut row, sum)| {
            row.average_score = sum / row.count as f64;
            row
        })
        .collect();

    breakdown.sort_by(|a, b| {
        let pa = catalog.position(&a.name).unwrap_or(usize::MAX);
        let pb = catalog.position(&b.name).unwrap_or(usize::MAX);
        pa.cmp(&pb).then_with(|| a.name.cmp(&b.name))
    });

    breakdown
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ExerciseScore;
    use chrono::Utc;
    use uuid::Uuid;

    fn measurement(scores: &[(&str, f64)]) -> Measurement {
        let exercises: Vec<ExerciseScore> = scores
            .iter()
            .map(|&(name, score)| ExerciseScore::new(name, score, 4.0))
            .collect();
        Measurement {
            id: Uuid::new_v4(),
            patient_id: "JDM-2024-001".into(),
            total_score: exercises.iter().map(|e| e.score).sum(),
            exercises,
            recorded_at: Utc::now(),
            notes: None,
        }
    }

    #[test]
    fn test_improving_series() {
        let policy = TrendConfig::default();
        let stats = summarize(&[35.0, 38.0, 42.0], &policy).unwrap();

        assert_eq!(stats.trend, Trend::Improving);
        assert!((stats.average_score - 38.333_333).abs() < 1e-5);
        assert_eq!(stats.lowest_score, 35.0);
        assert_eq!(stats.highest_score, 42.0);
        assert_eq!(stats.latest_score, 42.0);
        assert_eq!(stats.total_measurements, 3);
        assert!((stats.improvement_rate.unwrap() - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_declining_and_stable() {
        let policy = TrendConfig::default();
        assert_eq!(classify_trend(&[42.0, 38.0, 35.0], &policy), Trend::Declining);
        assert_eq!(classify_trend(&[40.0, 36.0, 40.5], &policy), Trend::Stable);
        assert_eq!(classify_trend(&[40.0, 41.0], &policy), Trend::Stable);
    }

    #[test]
    fn test_short_series_is_stable() {
        let policy = TrendConfig::default();
        assert_eq!(classify_trend(&[], &policy), Trend::Stable);
        assert_eq!(classify_trend(&[30.0], &policy), Trend::Stable);
    }

    #[test]
    fn test_baseline_window() {
        let policy = TrendConfig {
            tolerance: 1.0,
            baseline_window: 2,
        };
        // Baseline (30 + 40) / 2 = 35, latest 35.5 is within tolerance
        assert_eq!(classify_trend(&[30.0, 40.0, 35.5], &policy), Trend::Stable);

        // Window larger than history still leaves the latest value out
        let wide = TrendConfig {
            tolerance: 1.0,
            baseline_window: 10,
        };
        assert_eq!(classify_trend(&[30.0, 34.0], &wide), Trend::Improving);
    }

    #[test]
    fn test_summarize_empty() {
        assert!(summarize(&[], &TrendConfig::default()).is_none());
    }

    #[test]
    fn test_single_measurement_has_no_rate() {
        let stats = summarize(&[30.0], &TrendConfig::default()).unwrap();
        assert_eq!(stats.improvement_rate, None);
        assert_eq!(stats.trend, Trend::Stable);
    }

    #[test]
    fn test_exercise_breakdown() {
        let measurements = vec![
            measurement(&[("Running", 1.0), ("Head lift", 4.0)]),
            measurement(&[("head lift", 2.0), ("Running", 3.0), ("Custom", 2.0)]),
        ];

        let breakdown = exercise_breakdown(&measurements);
        assert_eq!(breakdown.len(), 3);

        assert_eq!(breakdown[0].name, "Head lift");
        assert_eq!(breakdown[0].count, 2);
        assert_eq!(breakdown[0].average_score, 3.0);
        assert_eq!(breakdown[0].lowest_score, 2.0);
        assert_eq!(breakdown[0].highest_score, 4.0);

        assert_eq!(breakdown[1].name, "Running");
        assert_eq!(breakdown[1].average_score, 2.0);

        assert_eq!(breakdown[2].name, "Custom");
    }
}

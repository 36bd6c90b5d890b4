//! Interpretation of CMAS totals.

use crate::{Error, Result, SeverityBand};

/// Inclusive lower bounds, highest band first
const THRESHOLDS: [(f64, SeverityBand); 4] = [
    (48.0, SeverityBand::Normal),
    (40.0, SeverityBand::MildImpairment),
    (25.0, SeverityBand::ModerateImpairment),
    (10.0, SeverityBand::SevereImpairment),
];

/// Classify a total score into a severity band
pub fn interpret(total_score: f64) -> SeverityBand {
    THRESHOLDS
        .iter()
        .find(|(lower, _)| total_score >= *lower)
        .map(|&(_, band)| band)
        .unwrap_or(SeverityBand::VerySevereImpairment)
}

/// Percentage of the maximum, rounded half-up to a whole number
pub fn percentage(score: f64, max_score: f64) -> Result<u32> {
    if max_score == 0.0 {
        return Err(Error::DivisionByZero);
    }
    // Adding 0.5 and flooring keeps halves rounding up
    let pct = (score / max_score * 100.0 + 0.5).floor();
    Ok(pct.max(0.0) as u32)
}

//! Measurement history loading for reporting.
//!
//! This module loads a patient's measurements from both the WAL and the CSV
//! archive, filters them by date and pages through the result.

use crate::{Measurement, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Inclusive calendar-date filter on `recorded_at` (UTC)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    pub fn contains(&self, measurement: &Measurement) -> bool {
        let day = measurement.recorded_at.date_naive();
        self.from.map_or(true, |from| day >= from) && self.to.map_or(true, |to| day <= to)
    }
}

/// One page of a longer listing
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub limit: usize,
    pub total: usize,
    pub pages: usize,
}

/// Load all measurements for a patient from WAL and CSV
///
/// Returns measurements sorted by `recorded_at` (oldest first), as the
/// trend helpers expect. Measurements present in both sources are kept once.
pub fn load_patient_history(
    wal_path: &Path,
    csv_path: &Path,
    patient_id: &str,
    range: DateRange,
) -> Result<Vec<Measurement>> {
    let mut measurements = Vec::new();
    let mut seen_ids = HashSet::new();

    let wal = crate::wal::read_measurements(wal_path)?;
    let archived = crate::csv_rollup::read_archive(csv_path)?;
    let (wal_count, csv_count) = (wal.len(), archived.len());

    for measurement in wal.into_iter().chain(archived) {
        if measurement.patient_id != patient_id || !range.contains(&measurement) {
            continue;
        }
        if seen_ids.insert(measurement.id) {
            measurements.push(measurement);
        }
    }

    measurements.sort_by(|a, b| a.recorded_at.cmp(&b.recorded_at));

    tracing::debug!(
        "Scanned {} WAL and {} archived measurements",
        wal_count,
        csv_count
    );
    tracing::info!(
        "Loaded {} measurements for patient {}",
        measurements.len(),
        patient_id
    );

    Ok(measurements)
}

/// Slice out one page (1-based). A zero page or limit is treated as 1.
pub fn paginate<T: Clone>(items: &[T], page: usize, limit: usize) -> Page<T> {
    let page = page.max(1);
    let limit = limit.max(1);
    let total = items.len();
    let pages = total.div_ceil(limit);

    let start = (page - 1).saturating_mul(limit).min(total);
    let end = start.saturating_add(limit).min(total);

    Page {
        items: items[start..end].to_vec(),
        page,
        limit,
        total,
        pages,
    }
}

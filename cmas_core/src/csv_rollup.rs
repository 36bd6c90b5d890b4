//! CSV archive for rolled-up WAL measurements.
//!
//! This module implements atomic WAL-to-CSV conversion with proper error handling
//! to prevent data loss, and reads the archive back for reporting.

use crate::catalog::get_default_catalog;
use crate::interpretation::{interpret, percentage};
use crate::{Error, ExerciseScore, Measurement, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::Path;
use uuid::Uuid;

/// A row in the CSV archive
///
/// `percentage` and `interpretation` are informational; they are recomputed
/// from `total_score` when the archive is read back.
#[derive(Debug, Serialize, Deserialize)]
struct CsvRow {
    id: String,
    patient_id: String,
    recorded_at: String,
    total_score: f64,
    percentage: Option<u32>,
    interpretation: String,
    notes: Option<String>,
    /// JSON-encoded exercise list
    exercises: String,
}

impl TryFrom<&Measurement> for CsvRow {
    type Error = Error;

    fn try_from(m: &Measurement) -> Result<Self> {
        Ok(CsvRow {
            id: m.id.to_string(),
            patient_id: m.patient_id.clone(),
            recorded_at: m.recorded_at.to_rfc3339(),
            total_score: m.total_score,
            percentage: percentage(m.total_score, get_default_catalog().max_total()).ok(),
            interpretation: interpret(m.total_score).label().to_string(),
            notes: m.notes.clone(),
            exercises: serde_json::to_string(&m.exercises)?,
        })
    }
}

impl TryFrom<CsvRow> for Measurement {
    type Error = Error;

    fn try_from(row: CsvRow) -> Result<Self> {
        let id = Uuid::parse_str(&row.id)
            .map_err(|e| Error::Other(format!("Invalid UUID: {}", e)))?;

        let recorded_at = DateTime::parse_from_rfc3339(&row.recorded_at)
            .map_err(|e| Error::Other(format!("Invalid date: {}", e)))?
            .with_timezone(&Utc);

        let exercises: Vec<ExerciseScore> = serde_json::from_str(&row.exercises)?;

        Ok(Measurement {
            id,
            patient_id: row.patient_id,
            exercises,
            total_score: row.total_score,
            recorded_at,
            notes: row.notes.filter(|n| !n.is_empty()),
        })
    }
}

/// Roll up WAL measurements into CSV and archive the WAL
///
/// The WAL is held under an exclusive lock for the whole rollup, so
/// concurrent appends wait and land in the emptied log afterwards. This
/// function:
/// 1. Reads all measurements from the WAL
/// 2. Appends them to the CSV file (creates with headers if needed)
/// 3. Syncs the CSV to disk
/// 4. Appends the raw WAL contents to `.wal.processed`
/// 5. Truncates the WAL in place
/// 6. Returns the number of measurements processed
///
/// A crash between steps 3 and 5 leaves records in both the CSV and the WAL;
/// history loading deduplicates them by id.
pub fn wal_to_csv_and_archive(wal_path: &Path, csv_path: &Path) -> Result<usize> {
    if !wal_path.exists() {
        tracing::info!("No WAL to roll up");
        return Ok(0);
    }

    let mut wal = OpenOptions::new().read(true).write(true).open(wal_path)?;
    wal.lock_exclusive()?;
    let result = roll_up_locked(&mut wal, wal_path, csv_path);
    wal.unlock()?;
    result
}

fn roll_up_locked(wal: &mut File, wal_path: &Path, csv_path: &Path) -> Result<usize> {
    let mut raw = Vec::new();
    wal.read_to_end(&mut raw)?;
    let measurements = crate::wal::parse_measurements(raw.as_slice())?;

    if measurements.is_empty() {
        tracing::info!("No measurements in WAL to roll up");
        return Ok(0);
    }

    if let Some(parent) = csv_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(csv_path)?;

    // Only a fresh file gets a header row
    let needs_headers = file.metadata()?.len() == 0;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(needs_headers)
        .from_writer(file);

    for measurement in &measurements {
        writer.serialize(CsvRow::try_from(measurement)?)?;
    }

    writer.flush()?;
    let file = writer
        .into_inner()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
    file.sync_all()?;

    tracing::info!("Wrote {} measurements to CSV", measurements.len());

    // CSV is durable before the WAL is emptied
    let processed_path = wal_path.with_extension("wal.processed");
    let mut processed = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&processed_path)?;
    processed.write_all(&raw)?;
    processed.sync_all()?;

    wal.set_len(0)?;
    wal.sync_all()?;

    tracing::info!("Archived WAL to {:?}", processed_path);

    Ok(measurements.len())
}

/// Read every measurement from the CSV archive
///
/// Malformed rows are skipped with a warning.
pub fn read_archive(path: &Path) -> Result<Vec<Measurement>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_path(path)?;

    let mut measurements = Vec::new();
    for result in reader.deserialize::<CsvRow>() {
        match result {
            Ok(row) => match Measurement::try_from(row) {
                Ok(measurement) => measurements.push(measurement),
                Err(e) => tracing::warn!("Failed to parse CSV row: {}", e),
            },
            Err(e) => tracing::warn!("Failed to deserialize CSV row: {}", e),
        }
    }

    tracing::debug!("Read {} measurements from CSV archive", measurements.len());
    Ok(measurements)
}

/// Clean up old processed WAL files
///
/// This removes all .wal.processed files in the given directory.
pub fn cleanup_processed_wals(dir: &Path) -> Result<usize> {
    if !dir.exists() {
        return Ok(0);
    }

    let mut count = 0;
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();

        if path.extension().is_some_and(|ext| ext == "processed") {
            std::fs::remove_file(&path)?;
            tracing::debug!("Removed processed WAL: {:?}", path);
            count += 1;
        }
    }

    if count > 0 {
        tracing::info!("Cleaned up {} processed WAL files", count);
    }

    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wal::{JsonlSink, MeasurementSink};
    use std::fs::File;

    fn create_test_measurement(total: f64) -> Measurement {
        Measurement {
            id: Uuid::new_v4(),
            patient_id: "JDM-2024-001".into(),
            exercises: vec![
                ExerciseScore::new("Head lift", 4.0, 4.0),
                ExerciseScore::new("Running", 1.5, 4.0),
            ],
            total_score: total,
            recorded_at: Utc::now(),
            notes: None,
        }
    }

    #[test]
    fn test_wal_to_csv_creates_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let wal_path = temp_dir.path().join("measurements.wal");
        let csv_path = temp_dir.path().join("measurements.csv");

        let mut sink = JsonlSink::new(&wal_path);
        for i in 0..3 {
            sink.append(&create_test_measurement(30.0 + i as f64)).unwrap();
        }

        let count = wal_to_csv_and_archive(&wal_path, &csv_path).unwrap();
        assert_eq!(count, 3);

        assert!(csv_path.exists());
        assert_eq!(std::fs::metadata(&wal_path).unwrap().len(), 0);
        assert_eq!(
            crate::wal::read_measurements(&wal_path.with_extension("wal.processed"))
                .unwrap()
                .len(),
            3
        );

        let contents = std::fs::read_to_string(&csv_path).unwrap();
        assert!(contents.starts_with("id,patient_id,recorded_at,total_score"));
    }

    #[test]
    fn test_wal_to_csv_appends_and_reads_back() {
        let temp_dir = tempfile::tempdir().unwrap();
        let wal_path = temp_dir.path().join("measurements.wal");
        let csv_path = temp_dir.path().join("measurements.csv");

        let first = create_test_measurement(35.0);
        let mut sink = JsonlSink::new(&wal_path);
        sink.append(&first).unwrap();
        assert_eq!(wal_to_csv_and_archive(&wal_path, &csv_path).unwrap(), 1);

        let mut sink = JsonlSink::new(&wal_path);
        sink.append(&create_test_measurement(42.0)).unwrap();
        assert_eq!(wal_to_csv_and_archive(&wal_path, &csv_path).unwrap(), 1);

        let archived = read_archive(&csv_path).unwrap();
        assert_eq!(archived.len(), 2);
        assert_eq!(archived[0].id, first.id);
        assert_eq!(archived[0].exercises.len(), 2);
        assert_eq!(archived[0].exercises[1].score, 1.5);
        assert_eq!(archived[1].total_score, 42.0);
    }

    #[test]
    fn test_rollup_during_appends_loses_nothing() {
        crate::logging::init_test();
        let temp_dir = tempfile::tempdir().unwrap();
        let wal_path = temp_dir.path().join("measurements.wal");
        let csv_path = temp_dir.path().join("measurements.csv");

        let writer = {
            let wal_path = wal_path.clone();
            std::thread::spawn(move || {
                let mut sink = JsonlSink::new(&wal_path);
                (0..40)
                    .map(|i| {
                        let m = create_test_measurement(i as f64);
                        sink.append(&m).unwrap();
                        m.id
                    })
                    .collect::<Vec<_>>()
            })
        };

        let mut rolled = 0;
        while !writer.is_finished() {
            rolled += wal_to_csv_and_archive(&wal_path, &csv_path).unwrap();
        }
        let written = writer.join().unwrap();
        rolled += wal_to_csv_and_archive(&wal_path, &csv_path).unwrap();

        assert_eq!(rolled, written.len());
        let archived: Vec<Uuid> = read_archive(&csv_path).unwrap().iter().map(|m| m.id).collect();
        assert_eq!(archived, written);
        assert!(crate::wal::read_measurements(&wal_path).unwrap().is_empty());
    }

    #[test]
    fn test_empty_wal() {
        let temp_dir = tempfile::tempdir().unwrap();
        let wal_path = temp_dir.path().join("empty.wal");
        let csv_path = temp_dir.path().join("measurements.csv");

        File::create(&wal_path).unwrap();

        let count = wal_to_csv_and_archive(&wal_path, &csv_path).unwrap();
        assert_eq!(count, 0);
        assert!(!csv_path.exists());
    }

    #[test]
    fn test_cleanup_processed_wals() {
        let temp_dir = tempfile::tempdir().unwrap();

        File::create(temp_dir.path().join("s1.wal.processed")).unwrap();
        File::create(temp_dir.path().join("s2.wal.processed")).unwrap();
        File::create(temp_dir.path().join("keep.wal")).unwrap();

        let count = cleanup_processed_wals(temp_dir.path()).unwrap();
        assert_eq!(count, 2);

        assert!(!temp_dir.path().join("s1.wal.processed").exists());
        assert!(temp_dir.path().join("keep.wal").exists());
    }
}

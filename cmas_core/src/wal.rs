//! Write-Ahead Log (WAL) for measurement persistence.
//!
//! Measurements are appended to a JSONL (JSON Lines) file with file locking
//! to ensure safe concurrent access. Appends never rewrite existing records;
//! only a rollup empties the log.

use crate::{Measurement, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Measurement sink trait for persisting accepted measurements
pub trait MeasurementSink {
    fn append(&mut self, measurement: &Measurement) -> Result<()>;
}

/// JSONL-based measurement sink with file locking
pub struct JsonlSink {
    path: PathBuf,
}

impl JsonlSink {
    /// Create a new JSONL sink for the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn ensure_parent_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

impl MeasurementSink for JsonlSink {
    fn append(&mut self, measurement: &Measurement) -> Result<()> {
        self.ensure_parent_dir()?;

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)?;

        file.lock_exclusive()?;

        // One record per line; a single write keeps the line intact
        let mut line = String::new();
        if ends_mid_line(&mut file)? {
            tracing::warn!("WAL {:?} ends in a partial line, terminating it", self.path);
            line.push('\n');
        }
        line.push_str(&serde_json::to_string(measurement)?);
        line.push('\n');
        let mut writer = std::io::BufWriter::new(&file);
        writer.write_all(line.as_bytes())?;
        writer.flush()?;
        drop(writer);

        file.unlock()?;

        tracing::debug!(
            "Appended measurement {} for {} to WAL",
            measurement.id,
            measurement.patient_id
        );
        Ok(())
    }
}

/// Whether the last record was cut off before its newline
fn ends_mid_line(file: &mut File) -> Result<bool> {
    if file.metadata()?.len() == 0 {
        return Ok(false);
    }
    let mut last = [0u8; 1];
    file.seek(SeekFrom::End(-1))?;
    file.read_exact(&mut last)?;
    Ok(last[0] != b'\n')
}

/// In-memory sink, used for dry runs and tests
#[derive(Debug, Default)]
pub struct MemorySink {
    pub measurements: Vec<Measurement>,
}

impl MeasurementSink for MemorySink {
    fn append(&mut self, measurement: &Measurement) -> Result<()> {
        self.measurements.push(measurement.clone());
        Ok(())
    }
}

/// Read all measurements from a WAL file
///
/// Lines that fail to parse are skipped with a warning.
pub fn read_measurements(path: &Path) -> Result<Vec<Measurement>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)?;
    file.lock_shared()?;
    let measurements = parse_measurements(BufReader::new(&file));
    file.unlock()?;

    let measurements = measurements?;
    tracing::debug!("Read {} measurements from WAL", measurements.len());
    Ok(measurements)
}

/// Parse JSONL measurement records, skipping lines that fail to parse
pub(crate) fn parse_measurements(reader: impl BufRead) -> Result<Vec<Measurement>> {
    let mut measurements = Vec::new();

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<Measurement>(&line) {
            Ok(measurement) => measurements.push(measurement),
            Err(e) => {
                tracing::warn!(
                    "Failed to parse measurement at line {}: {}",
                    line_num + 1,
                    e
                );
            }
        }
    }

    Ok(measurements)
}

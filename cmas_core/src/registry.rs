//! Patient registry persistence with file locking.
//!
//! Profiles are stored as a single JSON document, written atomically through
//! a temp file and guarded by advisory locks.

use crate::config::SeedPatient;
use crate::{Error, PatientProfile, Result, Role};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use fs2::FileExt;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

static PATIENT_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^JDM-(\d{4})-(\d{3})$").expect("valid patient id regex"));
static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

/// Check a patient id of the form `JDM-YYYY-NNN`
pub fn is_valid_patient_id(id: &str) -> bool {
    PATIENT_ID_RE.is_match(id)
}

/// Basic e-mail shape check
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Sidecar file serializing registry updates
fn lock_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".lock");
    PathBuf::from(name)
}

/// Details for a new registration
#[derive(Clone, Debug)]
pub struct NewPatient {
    pub name: String,
    pub email: String,
    pub role: Role,
    pub date_of_birth: Option<NaiveDate>,
    pub diagnosis_date: Option<NaiveDate>,
}

/// All registered profiles
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct PatientRegistry {
    pub patients: Vec<PatientProfile>,
}

impl PatientRegistry {
    /// Load the registry with shared locking
    ///
    /// Returns an empty registry if the file doesn't exist. A corrupted file
    /// is an error: silently dropping profiles would orphan measurements.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!("No registry file found, starting empty");
            return Ok(Self::default());
        }

        let file = File::open(path)?;
        file.lock_shared()?;

        let mut contents = String::new();
        let read = std::io::BufReader::new(&file).read_to_string(&mut contents);
        file.unlock()?;
        read?;

        let registry: PatientRegistry = serde_json::from_str(&contents).map_err(|e| {
            Error::Registry(format!("Failed to parse registry {:?}: {}", path, e))
        })?;
        tracing::debug!("Loaded {} profiles from {:?}", registry.patients.len(), path);
        Ok(registry)
    }

    /// Save the registry atomically with exclusive locking
    pub fn save(&self, path: &Path) -> Result<()> {
        let parent = path
            .parent()
            .ok_or_else(|| Error::Registry("registry path missing parent".into()))?;
        std::fs::create_dir_all(parent)?;

        let temp = NamedTempFile::new_in(parent)?;
        temp.as_file().lock_exclusive()?;

        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            serde_json::to_writer_pretty(&mut writer, self)?;
            writer.flush()?;
        }

        temp.as_file().sync_all()?;
        temp.as_file().unlock()?;

        temp.persist(path).map_err(|e| Error::Io(e.error))?;

        tracing::debug!("Saved registry to {:?}", path);
        Ok(())
    }

    /// Load, modify and save back
    ///
    /// The whole cycle runs under an exclusive lock on `<path>.lock`, so
    /// concurrent updates see each other's changes. Nothing is saved if `f`
    /// fails.
    pub fn update<F, T>(path: &Path, f: F) -> Result<T>
    where
        F: FnOnce(&mut PatientRegistry) -> Result<T>,
    {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let lock = OpenOptions::new()
            .create(true)
            .write(true)
            .open(lock_path(path))?;
        lock.lock_exclusive()?;

        let result = Self::load(path).and_then(|mut registry| {
            let out = f(&mut registry)?;
            registry.save(path)?;
            Ok(out)
        });

        lock.unlock()?;
        result
    }

    pub fn get(&self, patient_id: &str) -> Option<&PatientProfile> {
        self.patients.iter().find(|p| p.patient_id == patient_id)
    }

    pub fn is_empty(&self) -> bool {
        self.patients.is_empty()
    }

    /// Register a new profile and return it with its allocated id
    pub fn register(&mut self, new: NewPatient, now: DateTime<Utc>) -> Result<PatientProfile> {
        let name = new.name.trim();
        let email = new.email.trim().to_lowercase();

        if name.is_empty() {
            return Err(Error::Validation("name must not be empty".into()));
        }
        if !is_valid_email(&email) {
            return Err(Error::Validation(format!("invalid email '{}'", new.email)));
        }
        if self.patients.iter().any(|p| p.email == email) {
            return Err(Error::Validation("Email already registered".into()));
        }

        let profile = PatientProfile {
            patient_id: self.next_patient_id(now.year())?,
            name: name.to_string(),
            email,
            role: new.role,
            date_of_birth: new.date_of_birth,
            diagnosis_date: new.diagnosis_date,
            created_at: now,
        };

        tracing::info!("Registered {} as {}", profile.email, profile.patient_id);
        self.patients.push(profile.clone());
        Ok(profile)
    }

    /// Add config-declared profiles that are not yet present
    ///
    /// Returns the number of profiles added.
    pub fn seed(&mut self, seeds: &[SeedPatient], now: DateTime<Utc>) -> Result<usize> {
        let mut added = 0;
        for seed in seeds {
            if !is_valid_patient_id(&seed.patient_id) {
                return Err(Error::Config(format!(
                    "invalid seed patient id '{}'",
                    seed.patient_id
                )));
            }
            if self.get(&seed.patient_id).is_some() {
                continue;
            }
            self.patients.push(PatientProfile {
                patient_id: seed.patient_id.clone(),
                name: seed.name.clone(),
                email: seed.email.trim().to_lowercase(),
                role: seed.role,
                date_of_birth: seed.date_of_birth,
                diagnosis_date: seed.diagnosis_date,
                created_at: now,
            });
            added += 1;
        }
        if added > 0 {
            tracing::info!("Seeded {} profiles from config", added);
        }
        Ok(added)
    }

    /// Next free `JDM-<year>-NNN` id
    fn next_patient_id(&self, year: i32) -> Result<String> {
        let highest = self
            .patients
            .iter()
            .filter_map(|p| PATIENT_ID_RE.captures(&p.patient_id))
            .filter(|caps| caps[1].parse::<i32>().ok() == Some(year))
            .filter_map(|caps| caps[2].parse::<u32>().ok())
            .max()
            .unwrap_or(0);

        if highest >= 999 {
            return Err(Error::Registry(format!("patient ids for {} exhausted", year)));
        }
        Ok(format!("JDM-{}-{:03}", year, highest + 1))
    }
}

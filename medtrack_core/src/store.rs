//! Snapshot persistence with file locking.
//!
//! Medications and ledger snapshots are stored as JSON files. Reads take a
//! shared lock; writes go to a locked temp file that is synced and renamed
//! over the target.

use crate::{Error, Ledger, Medication, Result};
use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// File layout under a data directory
#[derive(Clone, Debug)]
pub struct DataPaths {
    pub data_dir: PathBuf,
}

impl DataPaths {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn medications(&self) -> PathBuf {
        self.data_dir.join("medications.json")
    }

    pub fn ledger_dir(&self) -> PathBuf {
        self.data_dir.join("ledger")
    }

    pub fn ledger_snapshot(&self) -> PathBuf {
        self.ledger_dir().join("ledger.json")
    }

    pub fn journal(&self) -> PathBuf {
        self.ledger_dir().join("taken.wal")
    }

    pub fn csv_export(&self) -> PathBuf {
        self.data_dir.join("taken.csv")
    }
}

/// Load a JSON value with shared locking
///
/// Returns the default value if the file doesn't exist.
/// If the file is unreadable or corrupted, logs a warning and returns the
/// default value.
pub fn load_json_or_default<T>(path: &Path) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    if !path.exists() {
        tracing::info!("No file found at {:?}, using defaults", path);
        return Ok(T::default());
    }

    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) => {
            tracing::warn!("Unable to open {:?}: {}. Using defaults.", path, e);
            return Ok(T::default());
        }
    };

    if let Err(e) = file.lock_shared() {
        tracing::warn!("Unable to lock {:?}: {}. Using defaults.", path, e);
        return Ok(T::default());
    }

    let mut contents = String::new();
    let mut reader = std::io::BufReader::new(&file);
    if let Err(e) = reader.read_to_string(&mut contents) {
        let _ = file.unlock();
        tracing::warn!("Failed to read {:?}: {}. Using defaults.", path, e);
        return Ok(T::default());
    }

    file.unlock()?;

    match serde_json::from_str::<T>(&contents) {
        Ok(value) => {
            tracing::debug!("Loaded {:?}", path);
            Ok(value)
        }
        Err(e) => {
            tracing::warn!("Failed to parse {:?}: {}. Using defaults.", path, e);
            Ok(T::default())
        }
    }
}

/// Save a JSON value atomically with exclusive locking
///
/// 1. Write to a temp file in the same directory
/// 2. Sync to disk
/// 3. Rename over the original
pub fn save_json<T>(path: &Path, value: &T) -> Result<()>
where
    T: Serialize + ?Sized,
{
    let parent = path
        .parent()
        .ok_or_else(|| Error::Storage(format!("{:?} has no parent directory", path)))?;
    std::fs::create_dir_all(parent)?;

    let temp = NamedTempFile::new_in(parent)?;
    temp.as_file().lock_exclusive()?;

    {
        let mut writer = std::io::BufWriter::new(temp.as_file());
        serde_json::to_writer_pretty(&mut writer, value)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
    }

    temp.as_file().sync_all()?;
    temp.as_file().unlock()?;

    temp.persist(path).map_err(|e| Error::Io(e.error))?;

    tracing::debug!("Saved {:?}", path);
    Ok(())
}

/// Load the medication list, empty if missing or unreadable
pub fn load_medications(path: &Path) -> Result<Vec<Medication>> {
    let medications: Vec<Medication> = load_json_or_default(path)?;
    tracing::debug!("Loaded {} medications", medications.len());
    Ok(medications)
}

pub fn save_medications(path: &Path, medications: &[Medication]) -> Result<()> {
    save_json(path, medications)
}

/// Load a ledger snapshot, empty if missing or unreadable
pub fn load_ledger_snapshot(path: &Path) -> Result<Ledger> {
    load_json_or_default(path)
}

pub fn save_ledger_snapshot(path: &Path, ledger: &Ledger) -> Result<()> {
    save_json(path, ledger)
}

/// Parse a medication list from a JSON file, failing on malformed input
///
/// Used for imports, where silently falling back to an empty list would
/// wipe the user's medications.
pub fn read_medications_strict(path: &Path) -> Result<Vec<Medication>> {
    let contents = std::fs::read_to_string(path)?;
    let medications: Vec<Medication> = serde_json::from_str(&contents)?;
    Ok(medications)
}

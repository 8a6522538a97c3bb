//! Ledger journal: an append-only JSONL log of ledger commands.
//!
//! Commands are appended under an exclusive lock, one JSON object per
//! line. The current ledger is the last snapshot with the journal replayed on
//! top through the pure [`Ledger`] operations, so concurrent writers can never
//! produce two entries for one dose triple. Compaction folds the journal into
//! a fresh snapshot and archives it.

use crate::clock::DayKeyPolicy;
use crate::store;
use crate::{Ledger, MedId, Result, TakenEntry};
use chrono::{DateTime, NaiveDate, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// A ledger mutation with its day already resolved
///
/// Storing the resolved date keeps replay independent of the day-key policy
/// in force when the journal is read back.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum LedgerCommand {
    Take(TakenEntry),
    Undo {
        med_id: MedId,
        scheduled_time: String,
        date: NaiveDate,
    },
    RemoveMedication {
        med_id: MedId,
    },
}

impl LedgerCommand {
    pub fn take(
        med_id: MedId,
        scheduled_time: &str,
        now: DateTime<Utc>,
        policy: DayKeyPolicy,
    ) -> Self {
        LedgerCommand::Take(TakenEntry {
            med_id,
            scheduled_time: scheduled_time.to_string(),
            date: policy.day_of(now),
            taken_at: now,
        })
    }

    pub fn undo(
        med_id: MedId,
        scheduled_time: &str,
        now: DateTime<Utc>,
        policy: DayKeyPolicy,
    ) -> Self {
        LedgerCommand::Undo {
            med_id,
            scheduled_time: scheduled_time.to_string(),
            date: policy.day_of(now),
        }
    }

    pub fn remove_medication(med_id: MedId) -> Self {
        LedgerCommand::RemoveMedication { med_id }
    }

    /// Apply this command to `ledger`, returning the new ledger
    pub fn apply(&self, ledger: &Ledger) -> Ledger {
        match self {
            LedgerCommand::Take(entry) => ledger.insert(entry.clone()),
            LedgerCommand::Undo {
                med_id,
                scheduled_time,
                date,
            } => ledger.remove(*med_id, scheduled_time, *date),
            LedgerCommand::RemoveMedication { med_id } => ledger.remove_medication(*med_id),
        }
    }
}

/// Destination for ledger commands
pub trait LedgerSink {
    fn append(&mut self, command: &LedgerCommand) -> Result<()>;
}

/// Lock file guarding a journal and its snapshot
///
/// Appends and compaction hold it exclusively, reads hold it shared. A
/// separate file is used because compaction renames the journal itself.
fn lock_path(journal_path: &Path) -> PathBuf {
    journal_path.with_extension("wal.lock")
}

fn acquire_lock(journal_path: &Path, exclusive: bool) -> Result<File> {
    if let Some(parent) = journal_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(lock_path(journal_path))?;
    if exclusive {
        file.lock_exclusive()?;
    } else {
        file.lock_shared()?;
    }
    Ok(file)
}

/// JSONL-based ledger journal with file locking
pub struct JsonlJournal {
    path: PathBuf,
}

impl JsonlJournal {
    /// Create a journal writer for the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LedgerSink for JsonlJournal {
    fn append(&mut self, command: &LedgerCommand) -> Result<()> {
        let lock = acquire_lock(&self.path, true)?;

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)?;

        // A torn last line must not swallow the next command
        let needs_newline = if file.metadata()?.len() > 0 {
            let mut last = [0u8; 1];
            file.seek(SeekFrom::End(-1))?;
            file.read_exact(&mut last)?;
            last[0] != b'\n'
        } else {
            false
        };

        let mut line = serde_json::to_string(command)?;
        line.push('\n');
        if needs_newline {
            tracing::warn!("Journal {:?} ended mid-line, starting a new line", self.path);
            line.insert(0, '\n');
        }
        file.write_all(line.as_bytes())?;
        file.sync_data()?;

        lock.unlock()?;

        tracing::debug!("Appended {:?} to journal", command);
        Ok(())
    }
}

/// Read all commands from a journal file
///
/// Lines that fail to parse are logged and skipped.
pub fn read_commands(path: &Path) -> Result<Vec<LedgerCommand>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let lock = acquire_lock(path, false)?;
    let commands = read_commands_locked(path)?;
    lock.unlock()?;
    Ok(commands)
}

fn read_commands_locked(path: &Path) -> Result<Vec<LedgerCommand>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let reader = BufReader::new(File::open(path)?);
    let mut commands = Vec::new();

    // Split on raw bytes so a line of invalid UTF-8 is skipped, not fatal
    for (line_num, line_result) in reader.split(b'\n').enumerate() {
        let line = line_result?;
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }

        match serde_json::from_slice::<LedgerCommand>(&line) {
            Ok(command) => commands.push(command),
            Err(e) => {
                tracing::warn!(
                    "Failed to parse journal command at line {}: {}",
                    line_num + 1,
                    e
                );
            }
        }
    }

    tracing::debug!("Read {} commands from journal", commands.len());
    Ok(commands)
}

/// Fold `commands` over `base` in order
pub fn replay(base: Ledger, commands: &[LedgerCommand]) -> Ledger {
    commands
        .iter()
        .fold(base, |ledger, command| command.apply(&ledger))
}

/// Current ledger: snapshot plus replayed journal
pub fn load_ledger(snapshot_path: &Path, journal_path: &Path) -> Result<Ledger> {
    if !journal_path.exists() {
        return store::load_ledger_snapshot(snapshot_path);
    }

    let lock = acquire_lock(journal_path, false)?;
    let snapshot = store::load_ledger_snapshot(snapshot_path)?;
    let commands = read_commands_locked(journal_path)?;
    lock.unlock()?;

    let ledger = replay(snapshot, &commands);
    tracing::debug!(
        "Loaded ledger with {} entries ({} journal commands)",
        ledger.len(),
        commands.len()
    );
    Ok(ledger)
}

/// Fold the journal into the snapshot and archive the journal
///
/// 1. Load snapshot and replay the journal
/// 2. Atomically write the new snapshot
/// 3. Rename the journal to `.wal.processed`
///
/// Runs under the exclusive journal lock, so no append can slip in between
/// reading the journal and archiving it. Returns the number of commands
/// folded in.
pub fn compact(snapshot_path: &Path, journal_path: &Path) -> Result<usize> {
    let lock = acquire_lock(journal_path, true)?;

    let commands = read_commands_locked(journal_path)?;
    if commands.is_empty() {
        lock.unlock()?;
        tracing::info!("No journal commands to compact");
        return Ok(0);
    }

    let snapshot = store::load_ledger_snapshot(snapshot_path)?;
    let ledger = replay(snapshot, &commands);
    store::save_ledger_snapshot(snapshot_path, &ledger)?;

    let processed_path = journal_path.with_extension("wal.processed");
    std::fs::rename(journal_path, &processed_path)?;
    lock.unlock()?;

    tracing::info!(
        "Compacted {} journal commands into snapshot, archived journal to {:?}",
        commands.len(),
        processed_path
    );
    Ok(commands.len())
}

/// Remove archived `.processed` journals from `dir`
pub fn cleanup_processed(dir: &Path) -> Result<usize> {
    if !dir.exists() {
        return Ok(0);
    }

    let mut count = 0;
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "processed") {
            std::fs::remove_file(&path)?;
            tracing::debug!("Removed processed journal: {:?}", path);
            count += 1;
        }
    }

    if count > 0 {
        tracing::info!("Cleaned up {} processed journals", count);
    }
    Ok(count)
}

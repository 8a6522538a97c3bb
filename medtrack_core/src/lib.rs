#![forbid(unsafe_code)]

//! Core domain model and scheduling logic for MedTrack.
//!
//! This crate provides:
//! - Domain types (medications, recurrence rules, taken-dose entries)
//! - Recurrence resolution and daily agenda expansion
//! - The taken-dose ledger with idempotent take/undo
//! - Persistence (snapshots, ledger journal, CSV export)
//! - Adherence history

pub mod types;
pub mod error;
pub mod clock;
pub mod config;
pub mod logging;
pub mod recurrence;
pub mod agenda;
pub mod ledger;
pub mod history;
pub mod catalog;
pub mod store;
pub mod journal;
pub mod export;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use clock::{Clock, DayKeyPolicy, FixedClock, SystemClock};
pub use config::{Config, CustomFrequencyPolicy, EveryOtherDayAnchor, ScheduleRules};
pub use recurrence::is_due;
pub use agenda::{build_agenda, reconcile, time_window};
pub use ledger::{day_key, Ledger};
pub use history::{adherence_summary, DayAdherence};
pub use catalog::{sample_medications, validate_medications};
pub use journal::{JsonlJournal, LedgerCommand, LedgerSink};

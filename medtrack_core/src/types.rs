//! Core domain types for MedTrack.
//!
//! This module defines the fundamental types used throughout the system:
//! - Medication records and their recurrence rules
//! - Taken-dose ledger entries
//! - Derived agenda occurrences

use chrono::{DateTime, NaiveDate, NaiveTime, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable medication identity, used as the ledger's foreign key
pub type MedId = i64;

// ============================================================================
// Frequency and Priority
// ============================================================================

/// Stored recurrence tag of a medication
///
/// Values outside the known set are kept verbatim so that storage
/// round-trips never lose them.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Frequency {
    #[default]
    Daily,
    EveryOtherDay,
    SpecificDays,
    Custom,
    Unrecognised(String),
}

impl Frequency {
    pub fn as_str(&self) -> &str {
        match self {
            Frequency::Daily => "daily",
            Frequency::EveryOtherDay => "every-other-day",
            Frequency::SpecificDays => "specific-days",
            Frequency::Custom => "custom",
            Frequency::Unrecognised(raw) => raw,
        }
    }
}

impl From<String> for Frequency {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "daily" => Frequency::Daily,
            "every-other-day" => Frequency::EveryOtherDay,
            "specific-days" => Frequency::SpecificDays,
            "custom" => Frequency::Custom,
            _ => Frequency::Unrecognised(raw),
        }
    }
}

impl From<Frequency> for String {
    fn from(frequency: Frequency) -> Self {
        match frequency {
            Frequency::Unrecognised(raw) => raw,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Display priority of a medication. Never affects scheduling.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Priority {
    Critical,
    Important,
    #[default]
    Routine,
    Other(String),
}

impl Priority {
    pub fn as_str(&self) -> &str {
        match self {
            Priority::Critical => "critical",
            Priority::Important => "important",
            Priority::Routine => "routine",
            Priority::Other(raw) => raw,
        }
    }
}

impl From<String> for Priority {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "critical" => Priority::Critical,
            "important" => Priority::Important,
            "routine" => Priority::Routine,
            _ => Priority::Other(raw),
        }
    }
}

impl From<Priority> for String {
    fn from(priority: Priority) -> Self {
        match priority {
            Priority::Other(raw) => raw,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Medication
// ============================================================================

/// A medication record as owned by the storage layer
///
/// Only `id`, `times`, `frequency`, `days_of_week`, `custom_frequency` and
/// `anchor_date` are interpreted by the engine; everything else is payload.
#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Medication {
    pub id: MedId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub dose: String,
    #[serde(default = "missing_frequency")]
    pub frequency: Frequency,
    #[serde(default)]
    pub times: Vec<String>,
    #[serde(default)]
    pub days_of_week: Vec<String>,
    #[serde(default)]
    pub custom_frequency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doctor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pills_remaining: Option<i64>,
    #[serde(default)]
    pub refillable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// A record saved without a frequency is unschedulable, not daily
fn missing_frequency() -> Frequency {
    Frequency::Unrecognised(String::new())
}

impl Medication {
    /// Resolve the stored fields into a typed recurrence rule
    pub fn recurrence(&self) -> Recurrence {
        match &self.frequency {
            Frequency::Daily => Recurrence::Daily,
            Frequency::EveryOtherDay => Recurrence::EveryOtherDay {
                anchor: self.anchor_date,
            },
            Frequency::SpecificDays => Recurrence::SpecificDays(
                self.days_of_week
                    .iter()
                    .filter_map(|label| parse_weekday_label(label))
                    .collect(),
            ),
            Frequency::Custom => Recurrence::Custom(self.custom_frequency.clone()),
            Frequency::Unrecognised(raw) => Recurrence::Unrecognised(raw.clone()),
        }
    }

    /// Priority used for display, defaulting to routine
    pub fn effective_priority(&self) -> Priority {
        self.priority.clone().unwrap_or_default()
    }

    /// True when the remaining pill count is known and under `threshold`
    pub fn is_low_stock(&self, threshold: i64) -> bool {
        matches!(self.pills_remaining, Some(n) if n < threshold)
    }
}

/// Typed recurrence rule derived from a medication record
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Recurrence {
    Daily,
    EveryOtherDay { anchor: Option<NaiveDate> },
    SpecificDays(Vec<Weekday>),
    /// Free-text schedule the engine cannot evaluate
    Custom(String),
    Unrecognised(String),
}

impl fmt::Display for Recurrence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recurrence::Daily => f.write_str("Daily"),
            Recurrence::EveryOtherDay { .. } => f.write_str("Every other day"),
            Recurrence::SpecificDays(days) => {
                let labels: Vec<String> = days.iter().map(|d| d.to_string()).collect();
                f.write_str(&labels.join(", "))
            }
            Recurrence::Custom(text) if text.trim().is_empty() => f.write_str("Custom schedule"),
            Recurrence::Custom(text) => f.write_str(text),
            Recurrence::Unrecognised(raw) => write!(f, "Unrecognised ({})", raw),
        }
    }
}

/// Parse a weekday label such as `Mon`, `wed` or `Friday`
///
/// Matching is case-insensitive on the first three letters.
pub fn parse_weekday_label(label: &str) -> Option<Weekday> {
    let prefix: String = label.trim().chars().take(3).collect::<String>().to_lowercase();
    match prefix.as_str() {
        "mon" => Some(Weekday::Mon),
        "tue" => Some(Weekday::Tue),
        "wed" => Some(Weekday::Wed),
        "thu" => Some(Weekday::Thu),
        "fri" => Some(Weekday::Fri),
        "sat" => Some(Weekday::Sat),
        "sun" => Some(Weekday::Sun),
        _ => None,
    }
}

/// Parse a zero-padded 24-hour `HH:MM` clock time
///
/// Returns None for anything else (`8:00`, `08:00:00`, `24:00`, empty).
pub fn parse_clock_time(raw: &str) -> Option<NaiveTime> {
    let bytes = raw.as_bytes();
    if bytes.len() != 5 || bytes[2] != b':' {
        return None;
    }
    if !bytes
        .iter()
        .enumerate()
        .all(|(i, b)| i == 2 || b.is_ascii_digit())
    {
        return None;
    }
    NaiveTime::parse_from_str(raw, "%H:%M").ok()
}

// ============================================================================
// Ledger Entries
// ============================================================================

/// One completed dose in the ledger
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TakenEntry {
    pub med_id: MedId,
    pub scheduled_time: String,
    pub date: NaiveDate,
    pub taken_at: DateTime<Utc>,
}

impl TakenEntry {
    /// Check whether this entry belongs to the given dose triple
    pub fn matches(&self, med_id: MedId, scheduled_time: &str, date: NaiveDate) -> bool {
        self.med_id == med_id && self.scheduled_time == scheduled_time && self.date == date
    }

    /// The dose triple identifying this entry
    pub fn key(&self) -> (MedId, &str, NaiveDate) {
        (self.med_id, self.scheduled_time.as_str(), self.date)
    }
}

// ============================================================================
// Agenda Types
// ============================================================================

/// One due administration of a medication at a scheduled clock time
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Occurrence<'a> {
    pub medication: &'a Medication,
    pub scheduled_time: &'a str,
}

/// Coarse part of the day a slot falls into
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TimeOfDay {
    Morning,
    Midday,
    Evening,
    Bedtime,
}

impl TimeOfDay {
    /// Bucket a clock time: morning 04-11, midday 11-15, evening 15-19
    pub fn from_time(time: NaiveTime) -> Self {
        match time.hour() {
            4..=10 => TimeOfDay::Morning,
            11..=14 => TimeOfDay::Midday,
            15..=18 => TimeOfDay::Evening,
            _ => TimeOfDay::Bedtime,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TimeOfDay::Morning => "Morning",
            TimeOfDay::Midday => "Lunch",
            TimeOfDay::Evening => "Evening",
            TimeOfDay::Bedtime => "Bedtime",
        }
    }
}

/// An occurrence annotated with its taken state for the agenda's day
#[derive(Clone, Debug, PartialEq)]
pub struct AgendaEntry<'a> {
    pub medication: &'a Medication,
    pub scheduled_time: &'a str,
    pub taken: bool,
    pub taken_at: Option<DateTime<Utc>>,
    pub time_of_day: TimeOfDay,
    pub low_stock: bool,
}

//! The taken-dose ledger.
//!
//! A set of [`TakenEntry`] records keyed by the dose triple
//! `(med_id, scheduled_time, date)`. At most one entry exists per triple.
//! All mutations return a new ledger and leave the receiver untouched.

use crate::clock::DayKeyPolicy;
use crate::{MedId, Medication, TakenEntry};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Canonical `YYYY-MM-DD` day key of an instant under `policy`
pub fn day_key(policy: DayKeyPolicy, at: DateTime<Utc>) -> String {
    policy.day_of(at).format("%Y-%m-%d").to_string()
}

/// Set of taken doses, in insertion order
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<TakenEntry>", into = "Vec<TakenEntry>")]
pub struct Ledger {
    entries: Vec<TakenEntry>,
}

impl From<Vec<TakenEntry>> for Ledger {
    fn from(entries: Vec<TakenEntry>) -> Self {
        Self::from_entries(entries)
    }
}

impl From<Ledger> for Vec<TakenEntry> {
    fn from(ledger: Ledger) -> Self {
        ledger.entries
    }
}

impl Ledger {
    /// Build a ledger, collapsing duplicate triples (first entry wins)
    pub fn from_entries(entries: Vec<TakenEntry>) -> Self {
        let before = entries.len();
        let mut seen = HashSet::new();
        let entries: Vec<TakenEntry> = entries
            .into_iter()
            .filter(|e| seen.insert((e.med_id, e.scheduled_time.clone(), e.date)))
            .collect();

        if entries.len() != before {
            tracing::warn!(
                "Dropped {} duplicate ledger entries",
                before - entries.len()
            );
        }
        Self { entries }
    }

    pub fn entries(&self) -> &[TakenEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up the entry for a dose triple
    pub fn find(
        &self,
        med_id: MedId,
        scheduled_time: &str,
        date: NaiveDate,
    ) -> Option<&TakenEntry> {
        self.entries
            .iter()
            .find(|e| e.matches(med_id, scheduled_time, date))
    }

    /// Membership test on the dose triple
    pub fn is_taken(&self, med_id: MedId, scheduled_time: &str, date: NaiveDate) -> bool {
        self.find(med_id, scheduled_time, date).is_some()
    }

    /// Add `entry` unless its triple is already present
    pub fn insert(&self, entry: TakenEntry) -> Ledger {
        if self.is_taken(entry.med_id, &entry.scheduled_time, entry.date) {
            tracing::debug!(
                "Dose {} @ {} on {} already taken, ignoring",
                entry.med_id,
                entry.scheduled_time,
                entry.date
            );
            return self.clone();
        }
        let mut entries = self.entries.clone();
        entries.push(entry);
        Ledger { entries }
    }

    /// Remove the entry for a dose triple, if any
    pub fn remove(&self, med_id: MedId, scheduled_time: &str, date: NaiveDate) -> Ledger {
        self.retain(|e| !e.matches(med_id, scheduled_time, date))
    }

    /// Mark a dose taken on the day of `now`
    ///
    /// Idempotent: taking an already-taken dose returns an equal ledger and
    /// keeps the original `taken_at`.
    pub fn take(
        &self,
        med_id: MedId,
        scheduled_time: &str,
        now: DateTime<Utc>,
        policy: DayKeyPolicy,
    ) -> Ledger {
        self.insert(TakenEntry {
            med_id,
            scheduled_time: scheduled_time.to_string(),
            date: policy.day_of(now),
            taken_at: now,
        })
    }

    /// Un-mark a dose on the day of `now`. No-op if it was not taken.
    pub fn undo(
        &self,
        med_id: MedId,
        scheduled_time: &str,
        now: DateTime<Utc>,
        policy: DayKeyPolicy,
    ) -> Ledger {
        self.remove(med_id, scheduled_time, policy.day_of(now))
    }

    /// Drop every entry of a deleted medication
    pub fn remove_medication(&self, med_id: MedId) -> Ledger {
        self.retain(|e| e.med_id != med_id)
    }

    /// Drop entries that reference medications not in `medications`
    pub fn prune_orphans(&self, medications: &[Medication]) -> Ledger {
        let known: HashSet<MedId> = medications.iter().map(|m| m.id).collect();
        let pruned = self.retain(|e| known.contains(&e.med_id));
        if pruned.len() != self.len() {
            tracing::warn!(
                "Pruned {} ledger entries for deleted medications",
                self.len() - pruned.len()
            );
        }
        pruned
    }

    /// Entries recorded for one calendar day
    pub fn entries_on(&self, date: NaiveDate) -> impl Iterator<Item = &TakenEntry> {
        self.entries.iter().filter(move |e| e.date == date)
    }

    fn retain<F>(&self, keep: F) -> Ledger
    where
        F: Fn(&TakenEntry) -> bool,
    {
        Ledger {
            entries: self.entries.iter().filter(|e| keep(*e)).cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    const POLICY: DayKeyPolicy = DayKeyPolicy::Utc;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sample_ledger() -> Ledger {
        Ledger::default()
            .take(3, "07:30", at(2023, 12, 31, 7, 40), POLICY)
            .take(4, "12:00", at(2024, 1, 1, 12, 10), POLICY)
    }

    #[test]
    fn test_take_then_is_taken_is_date_scoped() {
        let ledger = Ledger::default().take(1, "08:00", at(2024, 1, 1, 8, 5), POLICY);

        assert!(ledger.is_taken(1, "08:00", date(2024, 1, 1)));
        assert!(!ledger.is_taken(1, "08:00", date(2024, 1, 2)));
        assert!(!ledger.is_taken(1, "20:00", date(2024, 1, 1)));
    }

    #[test]
    fn test_double_take_yields_single_entry() {
        let now = at(2024, 1, 1, 8, 5);
        let once = Ledger::default().take(1, "08:00", now, POLICY);
        let twice = once.take(1, "08:00", now, POLICY);

        assert_eq!(twice.len(), 1);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_take_idempotent_regardless_of_second_now() {
        let l = sample_ledger();
        let now = at(2024, 1, 1, 8, 5);
        let once = l.take(1, "08:00", now, POLICY);
        let again = once.take(1, "08:00", now + Duration::hours(3), POLICY);

        assert_eq!(once, again);
        assert_eq!(again.find(1, "08:00", date(2024, 1, 1)).unwrap().taken_at, now);
    }

    #[test]
    fn test_undo_idempotent() {
        let now = at(2024, 1, 1, 8, 5);
        let l = sample_ledger().take(1, "08:00", now, POLICY);

        let once = l.undo(1, "08:00", now, POLICY);
        let twice = once.undo(1, "08:00", now, POLICY);
        assert_eq!(once, twice);
        assert!(!once.is_taken(1, "08:00", date(2024, 1, 1)));
    }

    #[test]
    fn test_undo_of_untaken_is_noop() {
        let l = sample_ledger();
        assert_eq!(l.undo(9, "08:00", at(2024, 1, 1, 9, 0), POLICY), l);
    }

    #[test]
    fn test_take_undo_inverse() {
        let l = sample_ledger();
        let now = at(2024, 1, 1, 8, 5);
        assert!(!l.is_taken(1, "08:00", date(2024, 1, 1)));

        let restored = l.take(1, "08:00", now, POLICY).undo(1, "08:00", now, POLICY);
        assert_eq!(restored, l);
    }

    #[test]
    fn test_undo_only_touches_today() {
        let l = Ledger::default()
            .take(1, "08:00", at(2024, 1, 1, 8, 0), POLICY)
            .take(1, "08:00", at(2024, 1, 2, 8, 0), POLICY);

        let undone = l.undo(1, "08:00", at(2024, 1, 2, 9, 0), POLICY);
        assert!(undone.is_taken(1, "08:00", date(2024, 1, 1)));
        assert!(!undone.is_taken(1, "08:00", date(2024, 1, 2)));
    }

    #[test]
    fn test_mutations_leave_original_untouched() {
        let l = sample_ledger();
        let snapshot = l.clone();
        let _ = l.take(1, "08:00", at(2024, 1, 1, 8, 5), POLICY);
        let _ = l.remove_medication(3);
        assert_eq!(l, snapshot);
    }

    #[test]
    fn test_remove_medication_cascades() {
        let l = sample_ledger()
            .take(3, "07:30", at(2024, 1, 1, 7, 35), POLICY)
            .take(1, "08:00", at(2024, 1, 1, 8, 5), POLICY);

        let after = l.remove_medication(3);
        assert!(after.entries().iter().all(|e| e.med_id != 3));
        assert_eq!(after.len(), 2);
    }

    #[test]
    fn test_prune_orphans() {
        let meds = vec![Medication {
            id: 4,
            ..Default::default()
        }];
        let pruned = sample_ledger().prune_orphans(&meds);
        assert_eq!(pruned.len(), 1);
        assert_eq!(pruned.entries()[0].med_id, 4);
    }

    #[test]
    fn test_from_entries_collapses_duplicates() {
        let first = TakenEntry {
            med_id: 1,
            scheduled_time: "08:00".into(),
            date: date(2024, 1, 1),
            taken_at: at(2024, 1, 1, 8, 0),
        };
        let dup = TakenEntry {
            taken_at: at(2024, 1, 1, 8, 30),
            ..first.clone()
        };

        let ledger: Ledger =
            serde_json::from_value(serde_json::to_value(vec![first.clone(), dup]).unwrap())
                .unwrap();
        assert_eq!(ledger.entries(), &[first]);
    }

    #[test]
    fn test_serialized_shape() {
        let l = Ledger::default().take(1, "08:00", at(2024, 1, 1, 8, 5), POLICY);
        let json = serde_json::to_string(&l).unwrap();
        assert!(json.starts_with('['));
        assert!(json.contains(r#""medId":1"#));
        assert!(json.contains(r#""scheduledTime":"08:00""#));
        assert!(json.contains(r#""date":"2024-01-01""#));
        assert!(json.contains(r#""takenAt":"#));
    }

    #[test]
    fn test_day_key_format() {
        assert_eq!(day_key(DayKeyPolicy::Utc, at(2024, 3, 5, 23, 59)), "2024-03-05");
    }

    #[test]
    fn test_entries_on() {
        let l = sample_ledger();
        assert_eq!(l.entries_on(date(2024, 1, 1)).count(), 1);
        assert_eq!(l.entries_on(date(2024, 1, 5)).count(), 0);
    }
}

//! Recurrence resolution: is a medication due on a given day?
//!
//! Rules by frequency:
//! - `daily`: always due
//! - `every-other-day`: due when the days elapsed since the anchor are even
//! - `specific-days`: due when the weekday is listed
//! - `custom`: free text, governed by [`CustomFrequencyPolicy`]
//! - anything else: never due

use crate::config::{CustomFrequencyPolicy, EveryOtherDayAnchor, ScheduleRules};
use crate::{Medication, Recurrence};
use chrono::{Datelike, NaiveDate};

/// Anchor shared by every medication under the global parity policy
pub fn global_anchor() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default()
}

/// Decide whether `medication` is due on `date`
///
/// Pure: depends only on its arguments. Never fails; rules that cannot be
/// evaluated resolve to "not due".
pub fn is_due(medication: &Medication, date: NaiveDate, rules: &ScheduleRules) -> bool {
    match medication.recurrence() {
        Recurrence::Daily => true,
        Recurrence::EveryOtherDay { anchor } => {
            let anchor = match rules.every_other_day_anchor {
                EveryOtherDayAnchor::Global => global_anchor(),
                EveryOtherDayAnchor::PerMedication => anchor.unwrap_or_else(global_anchor),
            };
            (date - anchor).num_days().rem_euclid(2) == 0
        }
        Recurrence::SpecificDays(days) => days.contains(&date.weekday()),
        Recurrence::Custom(_) => rules.custom_frequency == CustomFrequencyPolicy::AlwaysDue,
        Recurrence::Unrecognised(raw) => {
            tracing::debug!(
                "Medication {} has unrecognised frequency '{}', not scheduling",
                medication.id,
                raw
            );
            false
        }
    }
}

//! Adherence history over a window of days.
//!
//! Each day is evaluated with the same agenda + reconciliation pipeline as
//! the today view, so history and today can never disagree.

use crate::agenda::{build_agenda, reconcile};
use crate::config::{DisplayConfig, ScheduleRules};
use crate::{Ledger, Medication};
use chrono::{Duration, NaiveDate};
use std::collections::HashSet;

/// Adherence figures for one calendar day
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DayAdherence {
    pub date: NaiveDate,
    pub scheduled: usize,
    pub taken: usize,
    /// Ledger entries that day whose slot is not on that day's agenda
    pub unscheduled_taken: usize,
}

impl DayAdherence {
    /// Taken share of scheduled doses, None when nothing was scheduled
    pub fn ratio(&self) -> Option<f64> {
        if self.scheduled == 0 {
            None
        } else {
            Some(self.taken as f64 / self.scheduled as f64)
        }
    }
}

/// Summarise the `days` calendar days ending at `end_date`, newest first
pub fn adherence_summary(
    medications: &[Medication],
    ledger: &Ledger,
    end_date: NaiveDate,
    days: u32,
    rules: &ScheduleRules,
) -> Vec<DayAdherence> {
    let display = DisplayConfig::default();

    // Stops early rather than stepping past the first representable date
    let summary: Vec<DayAdherence> = (0..i64::from(days))
        .map_while(|offset| end_date.checked_sub_signed(Duration::days(offset)))
        .map(|date| {
            let agenda = build_agenda(medications, date, rules);
            let entries = reconcile(&agenda, ledger, date, &display);

            let on_agenda: HashSet<(i64, &str)> = agenda
                .iter()
                .map(|o| (o.medication.id, o.scheduled_time))
                .collect();
            let unscheduled_taken = ledger
                .entries_on(date)
                .filter(|e| !on_agenda.contains(&(e.med_id, e.scheduled_time.as_str())))
                .count();

            DayAdherence {
                date,
                scheduled: entries.len(),
                taken: entries.iter().filter(|e| e.taken).count(),
                unscheduled_taken,
            }
        })
        .collect();

    tracing::debug!("Computed adherence for {} days ending {}", days, end_date);
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DayKeyPolicy, Frequency};
    use chrono::{DateTime, TimeZone, Utc};

    fn at(d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, d, h, 0, 0).unwrap()
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn meds() -> Vec<Medication> {
        vec![
            Medication {
                id: 1,
                frequency: Frequency::Daily,
                times: vec!["08:00".into(), "20:00".into()],
                ..Default::default()
            },
            Medication {
                id: 2,
                frequency: Frequency::SpecificDays,
                days_of_week: vec!["Wed".into()],
                times: vec!["09:00".into()],
                ..Default::default()
            },
        ]
    }

    #[test]
    fn test_summary_counts() {
        let p = DayKeyPolicy::Utc;
        let ledger = Ledger::default()
            .take(1, "08:00", at(2, 8), p)
            .take(1, "08:00", at(3, 8), p)
            .take(1, "20:00", at(3, 20), p)
            .take(2, "09:00", at(3, 9), p);

        let summary = adherence_summary(&meds(), &ledger, date(3), 2, &ScheduleRules::default());
        assert_eq!(summary.len(), 2);

        // 2024-01-03 is a Wednesday: three slots, all taken
        assert_eq!(summary[0].date, date(3));
        assert_eq!(summary[0].scheduled, 3);
        assert_eq!(summary[0].taken, 3);
        assert_eq!(summary[0].ratio(), Some(1.0));

        assert_eq!(summary[1].date, date(2));
        assert_eq!(summary[1].scheduled, 2);
        assert_eq!(summary[1].taken, 1);
    }

    #[test]
    fn test_unscheduled_taken_reported() {
        let ledger = Ledger::default().take(2, "09:00", at(2, 9), DayKeyPolicy::Utc);
        let summary = adherence_summary(&meds(), &ledger, date(2), 1, &ScheduleRules::default());

        assert_eq!(summary[0].taken, 0);
        assert_eq!(summary[0].unscheduled_taken, 1);
    }

    #[test]
    fn test_window_stops_at_earliest_date() {
        let end = NaiveDate::MIN + Duration::days(1);
        let summary = adherence_summary(
            &meds(),
            &Ledger::default(),
            end,
            u32::MAX,
            &ScheduleRules::default(),
        );

        assert_eq!(summary.len(), 2);
        assert_eq!(summary[1].date, NaiveDate::MIN);
    }

    #[test]
    fn test_empty_day_has_no_ratio() {
        let summary = adherence_summary(&[], &Ledger::default(), date(1), 1, &ScheduleRules::default());
        assert_eq!(summary[0].scheduled, 0);
        assert_eq!(summary[0].ratio(), None);
    }
}

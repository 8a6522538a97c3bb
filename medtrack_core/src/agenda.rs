//! Daily agenda: expanding due medications into timed occurrences.
//!
//! The agenda is never stored. It is rebuilt from the medication list on
//! every call so edits show up immediately.

use crate::config::{DisplayConfig, ScheduleRules};
use crate::recurrence::is_due;
use crate::{parse_clock_time, AgendaEntry, Ledger, Medication, Occurrence, TimeOfDay};
use chrono::{Duration, NaiveDate, NaiveTime};

/// Build the ordered list of occurrences for `date`
///
/// One occurrence per well-formed `HH:MM` slot of each due medication.
/// Ordered by scheduled time; equal times keep medication order.
pub fn build_agenda<'a>(
    medications: &'a [Medication],
    date: NaiveDate,
    rules: &ScheduleRules,
) -> Vec<Occurrence<'a>> {
    let mut agenda: Vec<Occurrence<'a>> = medications
        .iter()
        .filter(|med| is_due(med, date, rules))
        .flat_map(|med| {
            med.times.iter().filter_map(move |time| {
                if parse_clock_time(time).is_none() {
                    if !time.trim().is_empty() {
                        tracing::debug!(
                            "Skipping malformed time '{}' on medication {}",
                            time,
                            med.id
                        );
                    }
                    return None;
                }
                Some(Occurrence {
                    medication: med,
                    scheduled_time: time.as_str(),
                })
            })
        })
        .collect();

    // Zero-padded HH:MM orders correctly as plain strings; sort_by is stable
    agenda.sort_by(|a, b| a.scheduled_time.cmp(b.scheduled_time));

    tracing::debug!("Built agenda for {} with {} occurrences", date, agenda.len());
    agenda
}

/// Annotate each occurrence with its taken state on `date`
pub fn reconcile<'a>(
    agenda: &[Occurrence<'a>],
    ledger: &Ledger,
    date: NaiveDate,
    display: &DisplayConfig,
) -> Vec<AgendaEntry<'a>> {
    agenda
        .iter()
        .map(|occ| {
            let entry = ledger.find(occ.medication.id, occ.scheduled_time, date);
            let time_of_day = parse_clock_time(occ.scheduled_time)
                .map(TimeOfDay::from_time)
                .unwrap_or(TimeOfDay::Bedtime);

            AgendaEntry {
                medication: occ.medication,
                scheduled_time: occ.scheduled_time,
                taken: entry.is_some(),
                taken_at: entry.map(|e| e.taken_at),
                time_of_day,
                low_stock: occ.medication.is_low_stock(display.low_stock_threshold),
            }
        })
        .collect()
}

/// Clock times `minutes` before and after a slot, wrapping at midnight
///
/// Returns None if `scheduled_time` is not a valid `HH:MM` value.
pub fn time_window(scheduled_time: &str, minutes: i64) -> Option<(NaiveTime, NaiveTime)> {
    let center = parse_clock_time(scheduled_time)?;
    let delta = Duration::minutes(minutes);
    let (start, _) = center.overflowing_sub_signed(delta);
    let (end, _) = center.overflowing_add_signed(delta);
    Some((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DayKeyPolicy, Frequency};
    use chrono::{TimeZone, Utc};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn daily(id: i64, times: &[&str]) -> Medication {
        Medication {
            id,
            name: format!("med {}", id),
            frequency: Frequency::Daily,
            times: times.iter().map(|t| t.to_string()).collect(),
            ..Default::default()
        }
    }

    fn slots(agenda: &[Occurrence<'_>]) -> Vec<(i64, String)> {
        agenda
            .iter()
            .map(|o| (o.medication.id, o.scheduled_time.to_string()))
            .collect()
    }

    #[test]
    fn test_daily_two_slots_ordered() {
        let meds = vec![daily(1, &["20:00", "08:00"])];
        let agenda = build_agenda(&meds, date(2024, 1, 1), &ScheduleRules::default());

        assert_eq!(
            slots(&agenda),
            vec![(1, "08:00".to_string()), (1, "20:00".to_string())]
        );
    }

    #[test]
    fn test_specific_days_scenario() {
        let meds = vec![Medication {
            id: 2,
            frequency: Frequency::SpecificDays,
            days_of_week: vec!["Mon".into(), "Wed".into(), "Fri".into()],
            times: vec!["09:00".into()],
            ..Default::default()
        }];
        let rules = ScheduleRules::default();

        assert!(build_agenda(&meds, date(2024, 1, 2), &rules).is_empty());

        let wednesday = build_agenda(&meds, date(2024, 1, 3), &rules);
        assert_eq!(slots(&wednesday), vec![(2, "09:00".to_string())]);
    }

    #[test]
    fn test_agenda_sorted_and_stable() {
        let meds = vec![
            daily(1, &["12:00", "08:00"]),
            daily(2, &["08:00"]),
            daily(3, &["07:30", "21:30"]),
        ];
        let agenda = build_agenda(&meds, date(2024, 1, 1), &ScheduleRules::default());

        let times: Vec<&str> = agenda.iter().map(|o| o.scheduled_time).collect();
        assert!(times.windows(2).all(|w| w[0] <= w[1]));

        // Ties keep encounter order
        let at_eight: Vec<i64> = agenda
            .iter()
            .filter(|o| o.scheduled_time == "08:00")
            .map(|o| o.medication.id)
            .collect();
        assert_eq!(at_eight, vec![1, 2]);
    }

    #[test]
    fn test_agenda_is_deterministic() {
        let meds = vec![daily(1, &["09:00", "08:00"]), daily(2, &["08:00"])];
        let rules = ScheduleRules::default();
        let first = slots(&build_agenda(&meds, date(2024, 2, 2), &rules));
        let second = slots(&build_agenda(&meds, date(2024, 2, 2), &rules));
        assert_eq!(first, second);
    }

    #[test]
    fn test_malformed_and_empty_times_skipped() {
        let meds = vec![
            daily(1, &["", "8am", "08:00", "25:00"]),
            daily(2, &[]),
        ];
        let agenda = build_agenda(&meds, date(2024, 1, 1), &ScheduleRules::default());
        assert_eq!(slots(&agenda), vec![(1, "08:00".to_string())]);
    }

    #[test]
    fn test_reconcile_marks_taken_for_that_day_only() {
        let meds = vec![daily(1, &["08:00", "20:00"])];
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 8, 5, 0).unwrap();
        let ledger = Ledger::default().take(1, "08:00", now, DayKeyPolicy::Utc);
        let display = DisplayConfig::default();
        let rules = ScheduleRules::default();

        let day = date(2024, 1, 1);
        let entries = reconcile(&build_agenda(&meds, day, &rules), &ledger, day, &display);
        assert!(entries[0].taken);
        assert_eq!(entries[0].taken_at, Some(now));
        assert!(!entries[1].taken);
        assert_eq!(entries[1].taken_at, None);

        let next = date(2024, 1, 2);
        let entries = reconcile(&build_agenda(&meds, next, &rules), &ledger, next, &display);
        assert!(entries.iter().all(|e| !e.taken));
    }

    #[test]
    fn test_reconcile_ignores_orphans() {
        let meds = vec![daily(1, &["08:00"])];
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();
        let ledger = Ledger::default().take(99, "08:00", now, DayKeyPolicy::Utc);
        let day = date(2024, 1, 1);

        let entries = reconcile(
            &build_agenda(&meds, day, &ScheduleRules::default()),
            &ledger,
            day,
            &DisplayConfig::default(),
        );
        assert_eq!(entries.len(), 1);
        assert!(!entries[0].taken);
    }

    #[test]
    fn test_reconcile_annotations() {
        let mut med = daily(1, &["07:30", "19:00"]);
        med.pills_remaining = Some(3);
        let meds = vec![med];
        let day = date(2024, 1, 1);

        let entries = reconcile(
            &build_agenda(&meds, day, &ScheduleRules::default()),
            &Ledger::default(),
            day,
            &DisplayConfig::default(),
        );
        assert_eq!(entries[0].time_of_day, TimeOfDay::Morning);
        assert_eq!(entries[1].time_of_day, TimeOfDay::Bedtime);
        assert!(entries.iter().all(|e| e.low_stock));
    }

    #[test]
    fn test_missing_frequency_not_scheduled() {
        let meds: Vec<Medication> =
            serde_json::from_str(r#"[{"id": 3, "times": ["08:00"]}]"#).unwrap();

        let agenda = build_agenda(&meds, date(2024, 1, 1), &ScheduleRules::default());
        assert!(agenda.is_empty());
    }

    #[test]
    fn test_time_window() {
        let (start, end) = time_window("08:00", 60).unwrap();
        assert_eq!(start, NaiveTime::from_hms_opt(7, 0, 0).unwrap());
        assert_eq!(end, NaiveTime::from_hms_opt(9, 0, 0).unwrap());

        let (start, end) = time_window("23:30", 60).unwrap();
        assert_eq!(start, NaiveTime::from_hms_opt(22, 30, 0).unwrap());
        assert_eq!(end, NaiveTime::from_hms_opt(0, 30, 0).unwrap());

        assert!(time_window("bad", 60).is_none());
    }
}

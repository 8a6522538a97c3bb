//! Starter medications and medication list validation.

use crate::types::*;
use once_cell::sync::Lazy;
use std::collections::HashSet;

/// Cached starter set - built once and reused
static SAMPLE_MEDICATIONS: Lazy<Vec<Medication>> = Lazy::new(build_sample_medications);

/// The starter medications offered by `medtrack init --samples`
///
/// Ids are fixed (1..=6) so a fresh install is reproducible.
pub fn sample_medications() -> &'static [Medication] {
    &SAMPLE_MEDICATIONS
}

#[allow(clippy::too_many_arguments)]
fn sample(
    id: MedId,
    name: &str,
    dose: &str,
    frequency: Frequency,
    times: &[&str],
    doctor: &str,
    priority: Priority,
    instructions: &str,
    pills_remaining: i64,
    notes: &str,
) -> Medication {
    Medication {
        id,
        name: name.into(),
        dose: dose.into(),
        frequency,
        times: times.iter().map(|t| t.to_string()).collect(),
        doctor: Some(doctor.into()),
        priority: Some(priority),
        instructions: Some(instructions.into()),
        pills_remaining: Some(pills_remaining),
        refillable: true,
        notes: Some(notes.into()),
        ..Default::default()
    }
}

fn build_sample_medications() -> Vec<Medication> {
    let mut stomach = sample(
        2,
        "Stomach comfort tablet",
        "1 tablet",
        Frequency::SpecificDays,
        &["07:30"],
        "Dr. Rivera (Primary Care)",
        Priority::Important,
        "Take with a small snack if your stomach feels uneasy.",
        12,
        "For occasional stomach upset as advised by your doctor.",
    );
    stomach.days_of_week = vec!["Mon".into(), "Wed".into(), "Fri".into()];

    vec![
        sample(
            1,
            "Morning multivitamin",
            "1 tablet",
            Frequency::Daily,
            &["08:00"],
            "Dr. Rivera (Primary Care)",
            Priority::Critical,
            "Take with a full glass of water after breakfast.",
            30,
            "General daily vitamin.",
        ),
        stomach,
        sample(
            3,
            "Lunch-time digestive aid",
            "1 capsule",
            Frequency::Daily,
            &["12:00", "18:00"],
            "Dr. Chen (Gastroenterology)",
            Priority::Critical,
            "Take with meals. Swallow whole with water.",
            20,
            "Supports comfortable digestion with meals.",
        ),
        sample(
            4,
            "Blood pressure tablet",
            "10 mg",
            Frequency::Daily,
            &["09:00"],
            "Dr. Gomez (Primary Care)",
            Priority::Important,
            "Take at the same time every morning. Stand up slowly.",
            12,
            "For high blood pressure.",
        ),
        sample(
            5,
            "Evening fluid tablet",
            "20 mg",
            Frequency::EveryOtherDay,
            &["19:00"],
            "Dr. Kim (Cardiology)",
            Priority::Important,
            "Take early enough to avoid nighttime trips to the bathroom.",
            8,
            "Helps manage fluid balance as advised by your doctor.",
        ),
        sample(
            6,
            "Cholesterol tablet",
            "40 mg",
            Frequency::Daily,
            &["21:30"],
            "Dr. Gomez (Primary Care)",
            Priority::Routine,
            "Take in the evening. May take with or without food.",
            28,
            "For long-term heart and cholesterol management.",
        ),
    ]
}

/// Check a medication list for problems the agenda will silently skip
///
/// Returns a list of warnings, or empty Vec if everything schedules cleanly.
pub fn validate_medications(medications: &[Medication]) -> Vec<String> {
    let mut warnings = Vec::new();
    let mut seen_ids = HashSet::new();

    for med in medications {
        if !seen_ids.insert(med.id) {
            warnings.push(format!("Duplicate medication id {}", med.id));
        }

        if med.times.iter().all(|t| t.trim().is_empty()) {
            warnings.push(format!("Medication {} has no times", med.id));
        }
        let mut seen_times = HashSet::new();
        for time in &med.times {
            if !time.trim().is_empty() && !seen_times.insert(time.as_str()) {
                warnings.push(format!(
                    "Medication {} lists slot '{}' more than once",
                    med.id, time
                ));
            }
            if !time.trim().is_empty() && parse_clock_time(time).is_none() {
                warnings.push(format!(
                    "Medication {} has malformed time '{}' (expected HH:MM)",
                    med.id, time
                ));
            }
        }

        match med.recurrence() {
            Recurrence::SpecificDays(days) if days.is_empty() => {
                warnings.push(format!(
                    "Medication {} is specific-days but lists no recognised weekdays",
                    med.id
                ));
            }
            Recurrence::Custom(text) if text.trim().is_empty() => {
                warnings.push(format!(
                    "Medication {} has a custom frequency without a description",
                    med.id
                ));
            }
            Recurrence::Unrecognised(raw) if raw.trim().is_empty() => {
                warnings.push(format!("Medication {} has no frequency", med.id));
            }
            Recurrence::Unrecognised(raw) => {
                warnings.push(format!(
                    "Medication {} has unrecognised frequency '{}'",
                    med.id, raw
                ));
            }
            _ => {}
        }
    }

    warnings
}

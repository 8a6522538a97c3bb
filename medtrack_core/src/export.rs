//! CSV export of the taken-dose ledger.

use crate::{Ledger, MedId, Medication, Result};
use std::collections::HashMap;
use std::path::Path;

/// A row in the CSV output
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct CsvRow {
    pub med_id: MedId,
    pub medication: String,
    pub scheduled_time: String,
    pub date: String,
    pub taken_at: String,
}

/// Write every ledger entry to `csv_path`, replacing any previous export
///
/// Rows are ordered by date then scheduled time. Entries whose medication
/// has been deleted are exported with an empty name.
///
/// Returns the number of rows written.
pub fn export_ledger_csv(
    ledger: &Ledger,
    medications: &[Medication],
    csv_path: &Path,
) -> Result<usize> {
    if let Some(parent) = csv_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let names: HashMap<MedId, &str> = medications
        .iter()
        .map(|m| (m.id, m.name.as_str()))
        .collect();

    let mut entries: Vec<_> = ledger.entries().iter().collect();
    entries.sort_by(|a, b| {
        (a.date, a.scheduled_time.as_str(), a.med_id).cmp(&(
            b.date,
            b.scheduled_time.as_str(),
            b.med_id,
        ))
    });

    let mut writer = csv::Writer::from_path(csv_path)?;
    for entry in &entries {
        writer.serialize(CsvRow {
            med_id: entry.med_id,
            medication: names.get(&entry.med_id).copied().unwrap_or_default().to_string(),
            scheduled_time: entry.scheduled_time.clone(),
            date: entry.date.format("%Y-%m-%d").to_string(),
            taken_at: entry.taken_at.to_rfc3339(),
        })?;
    }
    writer.flush()?;

    tracing::info!("Exported {} ledger entries to {:?}", entries.len(), csv_path);
    Ok(entries.len())
}

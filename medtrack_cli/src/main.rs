use chrono::{DateTime, Local, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use medtrack_core::store::{self, DataPaths};
use medtrack_core::*;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "medtrack")]
#[command(about = "Daily medication schedule and dose tracker", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Read configuration from this file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Pretend the current time is this RFC 3339 timestamp
    #[arg(long, global = true)]
    now: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show today's doses and whether they were taken (default)
    Today {
        /// Show the agenda for another day (YYYY-MM-DD)
        #[arg(long)]
        date: Option<String>,
    },

    /// Mark a dose as taken today
    Take {
        med_id: MedId,
        /// Scheduled slot (HH:MM)
        time: String,
    },

    /// Un-mark a dose taken today
    Undo {
        med_id: MedId,
        /// Scheduled slot (HH:MM)
        time: String,
    },

    /// List all medications
    Meds,

    /// Delete a medication and its dose history
    Remove { med_id: MedId },

    /// Replace the medication list with the contents of a JSON file
    Import { file: PathBuf },

    /// Create the data directory
    Init {
        /// Seed a starter set of sample medications
        #[arg(long)]
        samples: bool,
    },

    /// Show adherence for recent days
    History {
        /// Number of days to include, ending today
        #[arg(long, default_value_t = 7)]
        days: u32,
    },

    /// Export the dose ledger to CSV
    Export {
        /// Output file (defaults to taken.csv in the data directory)
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Fold the ledger journal into the snapshot
    Compact {
        /// Remove archived journals after compaction
        #[arg(long)]
        cleanup: bool,
    },
}

/// Everything a command needs: where data lives, rules, and the clock
struct App {
    paths: DataPaths,
    config: Config,
    clock: Box<dyn Clock>,
}

impl App {
    fn rules(&self) -> &ScheduleRules {
        &self.config.schedule
    }

    fn policy(&self) -> DayKeyPolicy {
        self.config.schedule.day_key
    }

    fn today(&self) -> NaiveDate {
        self.policy().today(self.clock.as_ref())
    }

    fn load_medications(&self) -> Result<Vec<Medication>> {
        let medications = store::load_medications(&self.paths.medications())?;
        for warning in validate_medications(&medications) {
            tracing::warn!("{}", warning);
        }
        Ok(medications)
    }

    /// Current ledger with entries of deleted medications dropped
    fn load_ledger(&self, medications: &[Medication]) -> Result<Ledger> {
        let ledger = journal::load_ledger(&self.paths.ledger_snapshot(), &self.paths.journal())?;
        Ok(ledger.prune_orphans(medications))
    }

    fn journal(&self) -> JsonlJournal {
        JsonlJournal::new(self.paths.journal())
    }

    /// Render an instant as a wall-clock time in the configured calendar
    fn clock_label(&self, at: DateTime<Utc>) -> String {
        match self.policy() {
            DayKeyPolicy::Local => at.with_timezone(&Local).format("%H:%M").to_string(),
            DayKeyPolicy::Utc => at.format("%H:%M").to_string(),
        }
    }
}

fn main() -> Result<()> {
    // Initialize logging
    medtrack_core::logging::init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let data_dir = cli
        .data_dir
        .clone()
        .unwrap_or_else(|| config.data.data_dir.clone());

    let clock: Box<dyn Clock> = match &cli.now {
        Some(raw) => Box::new(FixedClock(parse_timestamp(raw)?)),
        None => Box::new(SystemClock),
    };

    let app = App {
        paths: DataPaths::new(data_dir),
        config,
        clock,
    };

    match cli.command {
        Some(Commands::Today { date }) => cmd_today(&app, date),
        Some(Commands::Take { med_id, time }) => cmd_take(&app, med_id, &time),
        Some(Commands::Undo { med_id, time }) => cmd_undo(&app, med_id, &time),
        Some(Commands::Meds) => cmd_meds(&app),
        Some(Commands::Remove { med_id }) => cmd_remove(&app, med_id),
        Some(Commands::Import { file }) => cmd_import(&app, &file),
        Some(Commands::Init { samples }) => cmd_init(&app, samples),
        Some(Commands::History { days }) => cmd_history(&app, days),
        Some(Commands::Export { output }) => cmd_export(&app, output),
        Some(Commands::Compact { cleanup }) => cmd_compact(&app, cleanup),
        None => {
            // Default to "today" command
            cmd_today(&app, None)
        }
    }
}

fn cmd_today(app: &App, date: Option<String>) -> Result<()> {
    let date = match date {
        Some(raw) => parse_date(&raw)?,
        None => app.today(),
    };

    let medications = app.load_medications()?;
    let ledger = app.load_ledger(&medications)?;

    let agenda = build_agenda(&medications, date, app.rules());
    let entries = reconcile(&agenda, &ledger, date, &app.config.display);

    println!("\n╭─────────────────────────────────────────╮");
    println!("│  DOSES FOR {} ({})", date.format("%Y-%m-%d"), date.format("%a"));
    println!("╰─────────────────────────────────────────╯");

    if entries.is_empty() {
        println!("\n  No medications scheduled for this day.\n");
        return Ok(());
    }

    let mut current_bucket = None;
    for entry in &entries {
        if current_bucket != Some(entry.time_of_day) {
            current_bucket = Some(entry.time_of_day);
            println!("\n  {}", entry.time_of_day.label());
        }
        display_entry(app, entry);
    }

    let taken = entries.iter().filter(|e| e.taken).count();
    println!("\n  {}/{} doses taken\n", taken, entries.len());
    Ok(())
}

fn display_entry(app: &App, entry: &AgendaEntry<'_>) {
    let med = entry.medication;
    let mark = if entry.taken { "✓" } else { " " };

    let mut line = format!(
        "  [{}] {}  #{} {}",
        mark, entry.scheduled_time, med.id, med.name
    );
    if !med.dose.is_empty() {
        line.push_str(&format!(" ({})", med.dose));
    }
    line.push_str(&format!("  [{}]", med.effective_priority()));
    println!("{}", line);

    if let Some(taken_at) = entry.taken_at {
        println!("        Taken at {}", app.clock_label(taken_at));
    } else if let Some((start, end)) =
        time_window(entry.scheduled_time, app.config.display.window_minutes)
    {
        println!(
            "        Window {} - {}",
            start.format("%H:%M"),
            end.format("%H:%M")
        );
    }

    if let Some(instructions) = med.instructions.as_deref().filter(|s| !s.is_empty()) {
        println!("        {}", instructions);
    }

    if entry.low_stock {
        if let Some(pills) = med.pills_remaining {
            println!("        ⚠ Only {} pills remaining - consider refill", pills);
        }
    }
}

fn cmd_take(app: &App, med_id: MedId, time: &str) -> Result<()> {
    let medications = app.load_medications()?;
    let medication = find_slot(&medications, med_id, time)?;

    let now = app.clock.now();
    let today = app.policy().day_of(now);
    if !is_due(medication, today, app.rules()) {
        tracing::warn!(
            "Medication {} is not scheduled on {}, recording anyway",
            med_id,
            today
        );
    }

    let ledger = app.load_ledger(&medications)?;
    if ledger.is_taken(med_id, time, today) {
        println!("Already taken: #{} {} on {}", med_id, time, today);
        return Ok(());
    }

    let command = LedgerCommand::take(med_id, time, now, app.policy());
    app.journal().append(&command)?;

    println!(
        "✓ Taken: #{} {} {} on {}",
        med_id, medication.name, time, today
    );
    Ok(())
}

fn cmd_undo(app: &App, med_id: MedId, time: &str) -> Result<()> {
    let medications = app.load_medications()?;
    find_slot(&medications, med_id, time)?;

    let now = app.clock.now();
    let today = app.policy().day_of(now);

    let ledger = app.load_ledger(&medications)?;
    if !ledger.is_taken(med_id, time, today) {
        println!("Nothing to undo for #{} {} on {}", med_id, time, today);
        return Ok(());
    }

    let command = LedgerCommand::undo(med_id, time, now, app.policy());
    app.journal().append(&command)?;

    println!("✓ Undone: #{} {} on {}", med_id, time, today);
    Ok(())
}

fn cmd_meds(app: &App) -> Result<()> {
    let medications = app.load_medications()?;

    if medications.is_empty() {
        println!("No medications yet. Use `medtrack import` or `medtrack init --samples`.");
        return Ok(());
    }

    for med in &medications {
        println!("#{}  {}  {}", med.id, med.name, med.dose);
        println!("      {}  at {}", med.recurrence(), med.times.join(", "));
        if let Some(pills) = med.pills_remaining {
            println!("      {} pills remaining", pills);
        }
    }
    Ok(())
}

fn cmd_remove(app: &App, med_id: MedId) -> Result<()> {
    let medications = app.load_medications()?;
    let before = medications.len();
    let remaining: Vec<Medication> = medications
        .into_iter()
        .filter(|m| m.id != med_id)
        .collect();

    if remaining.len() == before {
        return Err(Error::InvalidInput(format!(
            "No medication with id {}",
            med_id
        )));
    }

    store::save_medications(&app.paths.medications(), &remaining)?;
    app.journal()
        .append(&LedgerCommand::remove_medication(med_id))?;

    println!("✓ Removed medication #{} and its dose history", med_id);
    Ok(())
}

fn cmd_import(app: &App, file: &Path) -> Result<()> {
    let imported = store::read_medications_strict(file)?;

    let warnings = validate_medications(&imported);
    for warning in &warnings {
        eprintln!("  - {}", warning);
    }

    // Cascade removals for medications that did not survive the import
    let previous = store::load_medications(&app.paths.medications())?;
    let ledger = journal::load_ledger(&app.paths.ledger_snapshot(), &app.paths.journal())?;
    let mut journal = app.journal();
    let mut dropped: Vec<MedId> = ledger
        .entries()
        .iter()
        .map(|e| e.med_id)
        .chain(previous.iter().map(|m| m.id))
        .filter(|id| !imported.iter().any(|m| m.id == *id))
        .collect();
    dropped.sort_unstable();
    dropped.dedup();

    store::save_medications(&app.paths.medications(), &imported)?;
    for med_id in &dropped {
        journal.append(&LedgerCommand::remove_medication(*med_id))?;
    }

    println!("✓ Imported {} medications", imported.len());
    if !warnings.is_empty() {
        println!("  {} warnings (see above)", warnings.len());
    }
    Ok(())
}

fn cmd_init(app: &App, samples: bool) -> Result<()> {
    std::fs::create_dir_all(app.paths.ledger_dir())?;

    let meds_path = app.paths.medications();
    if meds_path.exists() {
        println!("Medications already exist at {}", meds_path.display());
        return Ok(());
    }

    let medications: Vec<Medication> = if samples {
        sample_medications().to_vec()
    } else {
        Vec::new()
    };
    store::save_medications(&meds_path, &medications)?;

    println!("✓ Initialized {}", app.paths.data_dir.display());
    if samples {
        println!("  Added {} sample medications", medications.len());
    }
    Ok(())
}

fn cmd_history(app: &App, days: u32) -> Result<()> {
    let medications = app.load_medications()?;
    let ledger = app.load_ledger(&medications)?;

    let summary = adherence_summary(&medications, &ledger, app.today(), days, app.rules());

    println!("Date         Taken   Adherence");
    for day in &summary {
        let ratio = day
            .ratio()
            .map(|r| format!("{:.0}%", r * 100.0))
            .unwrap_or_else(|| "-".to_string());
        let mut line = format!(
            "{}   {}/{}   {}",
            day.date.format("%Y-%m-%d"),
            day.taken,
            day.scheduled,
            ratio
        );
        if day.unscheduled_taken > 0 {
            line.push_str(&format!("  (+{} unscheduled)", day.unscheduled_taken));
        }
        println!("{}", line);
    }
    Ok(())
}

fn cmd_export(app: &App, output: Option<PathBuf>) -> Result<()> {
    let medications = app.load_medications()?;
    let ledger = app.load_ledger(&medications)?;

    let csv_path = output.unwrap_or_else(|| app.paths.csv_export());
    let count = export::export_ledger_csv(&ledger, &medications, &csv_path)?;

    println!("✓ Exported {} doses to CSV", count);
    println!("  CSV: {}", csv_path.display());
    Ok(())
}

fn cmd_compact(app: &App, cleanup: bool) -> Result<()> {
    let journal_path = app.paths.journal();

    if !journal_path.exists() {
        println!("No journal found - nothing to compact.");
        return Ok(());
    }

    let count = journal::compact(&app.paths.ledger_snapshot(), &journal_path)?;
    println!("✓ Compacted {} journal commands", count);

    if cleanup {
        let cleaned = journal::cleanup_processed(&app.paths.ledger_dir())?;
        if cleaned > 0 {
            println!("✓ Cleaned up {} processed journals", cleaned);
        }
    }
    Ok(())
}

/// Look up a medication and check that `time` is one of its slots
fn find_slot<'a>(
    medications: &'a [Medication],
    med_id: MedId,
    time: &str,
) -> Result<&'a Medication> {
    if parse_clock_time(time).is_none() {
        return Err(Error::InvalidInput(format!(
            "'{}' is not a HH:MM time",
            time
        )));
    }

    let medication = medications
        .iter()
        .find(|m| m.id == med_id)
        .ok_or_else(|| Error::InvalidInput(format!("No medication with id {}", med_id)))?;

    if !medication.times.iter().any(|t| t == time) {
        return Err(Error::InvalidInput(format!(
            "Medication {} has no {} slot (slots: {})",
            med_id,
            time,
            medication.times.join(", ")
        )));
    }
    Ok(medication)
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|e| Error::InvalidInput(format!("Invalid date '{}': {}", raw, e)))
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::InvalidInput(format!("Invalid timestamp '{}': {}", raw, e)))
}

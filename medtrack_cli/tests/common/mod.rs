//! Shared helpers for medtrack CLI tests.

#![allow(dead_code)]

use assert_cmd::Command;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A throwaway data directory with its own config file
pub struct TestEnv {
    pub dir: TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        fs::write(
            dir.path().join("config.toml"),
            "[schedule]\nday_key = \"utc\"\n",
        )
        .expect("Failed to write config");
        Self { dir }
    }

    pub fn data_dir(&self) -> PathBuf {
        self.dir.path().join("data")
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.path().join("config.toml")
    }

    pub fn journal_path(&self) -> PathBuf {
        self.data_dir().join("ledger/taken.wal")
    }

    /// CLI command pointed at this environment, frozen at `now`
    pub fn cli_at(&self, now: &str) -> Command {
        let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("medtrack"));
        cmd.arg("--data-dir")
            .arg(self.data_dir())
            .arg("--config")
            .arg(self.config_path())
            .arg("--now")
            .arg(now);
        cmd
    }

    /// Import the standard two-medication fixture
    pub fn import_fixture(&self) {
        let fixture = self.dir.path().join("meds.json");
        write_fixture(&fixture);
        self.cli_at("2024-01-01T07:00:00Z")
            .arg("import")
            .arg(&fixture)
            .assert()
            .success();
    }

    pub fn journal_lines(&self) -> Vec<String> {
        fs::read_to_string(self.journal_path())
            .unwrap_or_default()
            .lines()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect()
    }
}

/// Medication 1: daily at 08:00 and 20:00.
/// Medication 2: Mon/Wed/Fri at 09:00.
pub fn write_fixture(path: &Path) {
    let meds = serde_json::json!([
        {
            "id": 1,
            "name": "Morning multivitamin",
            "dose": "1 tablet",
            "frequency": "daily",
            "times": ["20:00", "08:00"],
            "daysOfWeek": [],
            "customFrequency": "",
            "priority": "critical",
            "pillsRemaining": 30,
            "refillable": true
        },
        {
            "id": 2,
            "name": "Stomach comfort tablet",
            "dose": "1 tablet",
            "frequency": "specific-days",
            "times": ["09:00"],
            "daysOfWeek": ["Mon", "Wed", "Fri"],
            "customFrequency": "",
            "priority": "important",
            "pillsRemaining": 4,
            "refillable": true
        }
    ]);
    fs::write(path, serde_json::to_string_pretty(&meds).unwrap()).expect("Failed to write fixture");
}

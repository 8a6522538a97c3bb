//! Clock and calendar abstraction.
//!
//! Every "what day is it" decision goes through a [`Clock`] plus a
//! [`DayKeyPolicy`], so the agenda's today and the ledger's date field are
//! always derived the same way.

use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Source of the current instant
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock of the running system
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock frozen at one instant, for tests and `--now` overrides
#[derive(Clone, Copy, Debug)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Which calendar turns an instant into a day key
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayKeyPolicy {
    /// The machine's local wall-clock date
    #[default]
    Local,
    /// The UTC calendar date
    Utc,
}

impl DayKeyPolicy {
    /// Calendar day of `at` under this policy
    pub fn day_of(&self, at: DateTime<Utc>) -> NaiveDate {
        match self {
            DayKeyPolicy::Local => at.with_timezone(&Local).date_naive(),
            DayKeyPolicy::Utc => at.date_naive(),
        }
    }

    /// Today's date according to `clock`
    pub fn today(&self, clock: &dyn Clock) -> NaiveDate {
        self.day_of(clock.now())
    }
}

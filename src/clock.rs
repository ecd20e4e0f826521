//! Source of "today" for time-dependent classification.

use chrono::{Days, NaiveDate};
use std::fmt;
use std::sync::RwLock;

/// Supplies the current calendar date.
pub trait Clock: Send + Sync + fmt::Debug {
    fn today(&self) -> NaiveDate;
}

/// Wall clock, UTC calendar date.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        chrono::Utc::now().date_naive()
    }
}

/// Settable clock for tests and replays.
#[derive(Debug)]
pub struct FixedClock {
    today: RwLock<NaiveDate>,
}

impl FixedClock {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            today: RwLock::new(today),
        }
    }

    pub fn set(&self, today: NaiveDate) {
        let mut guard = self.today.write().unwrap_or_else(|e| e.into_inner());
        *guard = today;
    }

    pub fn advance_days(&self, days: u64) {
        let mut guard = self.today.write().unwrap_or_else(|e| e.into_inner());
        if let Some(next) = guard.checked_add_days(Days::new(days)) {
            *guard = next;
        }
    }
}

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        *self.today.read().unwrap_or_else(|e| e.into_inner())
    }
}

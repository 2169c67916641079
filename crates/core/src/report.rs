//! Run-level outcome accumulation.
//!
//! One summary value is threaded explicitly through each processing loop;
//! the engines hold no hidden shared state.

use std::fmt;

use crate::model::now_timestamp;

/// How a single per-resource outcome counts against the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tally {
    Success,
    Skipped,
    Failure,
}

/// Counters for one migration or rollback run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub success: usize,
    pub failure: usize,
    pub skipped: usize,
    pub started_at: String,
}

impl RunSummary {
    pub fn new() -> Self {
        Self {
            success: 0,
            failure: 0,
            skipped: 0,
            started_at: now_timestamp(),
        }
    }

    pub fn record(&mut self, tally: Tally) {
        match tally {
            Tally::Success => self.success += 1,
            Tally::Skipped => self.skipped += 1,
            Tally::Failure => self.failure += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.success + self.failure + self.skipped
    }
}

impl Default for RunSummary {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Run summary (started {}):", self.started_at)?;
        writeln!(f, "  total:   {}", self.total())?;
        writeln!(f, "  success: {}", self.success)?;
        writeln!(f, "  failed:  {}", self.failure)?;
        write!(f, "  skipped: {}", self.skipped)
    }
}

//! Operation outcomes
//!
//! Distinguishes "nothing to do" warnings from hard failures so that calling
//! tooling can pick exit codes independently of message severity.

use std::path::PathBuf;

use crate::error::BackupError;

/// Classification of a finished operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Outcome {
    Ok,
    Warning,
    Failure,
}

/// Result of a top-level backup, restore or list operation
#[derive(Debug)]
pub struct Report {
    /// Worst severity seen
    pub outcome: Outcome,
    /// User-facing message (may be empty in terse mode)
    pub message: String,
    /// Non-fatal problems encountered along the way
    pub warnings: Vec<BackupError>,
    /// Files that could not be deleted and should be removed at exit
    pub pending_cleanup: Vec<PathBuf>,
}

impl Report {
    /// A successful report with the given message
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::Ok,
            message: message.into(),
            warnings: Vec::new(),
            pending_cleanup: Vec::new(),
        }
    }

    /// A report for an operation that had nothing to do
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::Warning,
            ..Self::ok(message)
        }
    }

    /// Record a non-fatal problem; the outcome becomes at least `Warning`
    pub fn push_warning(&mut self, warning: BackupError) {
        self.outcome = self.outcome.max(Outcome::Warning);
        self.warnings.push(warning);
    }

    /// Whether any warnings were recorded
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

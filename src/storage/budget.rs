//! # Storage Budget
//!
//! Tracks the bytes consumed by captured images against a fixed ceiling.
//!
//! The budget is reactive: a capture is always written and counted first, and only
//! when the running total strictly exceeds the ceiling is that most recent file
//! deleted and its size subtracted. Between capture and rollback the total may
//! exceed the ceiling by up to one file. Older files are never touched.

use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, warn};

use crate::error::Result;

/// File extensions counted towards the budget
const COUNTED_EXTENSIONS: &[&str] = &["jpg", "h264"];

/// Outcome of a post-capture budget check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetOutcome {
    /// The capture stays on disk and in the total
    Retained,
    /// The capture was deleted and its size subtracted
    RolledBack,
}

/// Cumulative image size accounting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageBudget {
    ceiling_bytes: u64,
    consumed_bytes: u64,
}

impl StorageBudget {
    /// Empty budget with the given ceiling
    #[must_use]
    pub fn new(ceiling_bytes: u64) -> Self {
        Self {
            ceiling_bytes,
            consumed_bytes: 0,
        }
    }

    /// Budget pre-charged with the captures already present in `dir`.
    ///
    /// A missing directory counts as empty.
    pub fn from_existing(ceiling_bytes: u64, dir: &Path) -> Result<Self> {
        let mut budget = Self::new(ceiling_bytes);

        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(budget),
            Err(e) => return Err(e.into()),
        };

        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            let counted = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| COUNTED_EXTENSIONS.contains(&ext));
            if counted && entry.file_type()?.is_file() {
                budget.consumed_bytes += entry.metadata()?.len();
            }
        }

        debug!(
            "Counted {} bytes of existing captures in {}",
            budget.consumed_bytes,
            dir.display()
        );
        Ok(budget)
    }

    #[must_use]
    pub fn ceiling_bytes(&self) -> u64 {
        self.ceiling_bytes
    }

    #[must_use]
    pub fn consumed_bytes(&self) -> u64 {
        self.consumed_bytes
    }

    /// Read the size of a freshly written capture and add it to the total.
    ///
    /// # Returns
    ///
    /// * `Result<u64>` - Size of the file in bytes
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be stat'ed; the total is unchanged.
    pub fn record(&mut self, path: &Path) -> Result<u64> {
        let size = fs::metadata(path)?.len();
        self.consumed_bytes = self.consumed_bytes.saturating_add(size);
        Ok(size)
    }

    /// True once the total strictly exceeds the ceiling
    #[must_use]
    pub fn is_over_budget(&self) -> bool {
        self.consumed_bytes > self.ceiling_bytes
    }

    /// Delete `path` and subtract `size_bytes` from the total.
    ///
    /// The size is subtracted even when deletion fails, so the capture never
    /// stays charged. A file that is already gone is logged and ignored.
    ///
    /// # Errors
    ///
    /// Returns the I/O error for any deletion failure other than "not found".
    pub fn rollback(&mut self, path: &Path, size_bytes: u64) -> Result<()> {
        self.consumed_bytes = self.consumed_bytes.saturating_sub(size_bytes);

        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!("Rollback target {} already removed", path.display());
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Roll back the capture at `path` if it pushed the total over the ceiling.
    pub fn enforce(&mut self, path: &Path, size_bytes: u64) -> Result<BudgetOutcome> {
        if !self.is_over_budget() {
            return Ok(BudgetOutcome::Retained);
        }
        self.rollback(path, size_bytes)?;
        Ok(BudgetOutcome::RolledBack)
    }
}

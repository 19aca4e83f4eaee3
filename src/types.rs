// src/types.rs

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::errors::MirrorError;
use crate::pattern::Pattern;

/// A matched source file and the destination path it mirrors to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MappingEntry {
    pub source: PathBuf,
    pub destination: PathBuf,
}

impl MappingEntry {
    pub fn new(pattern: &Pattern, dest_root: &Path, source: impl Into<PathBuf>) -> Self {
        let source = source.into();
        let destination = pattern.map_to(dest_root, &source);
        Self {
            source,
            destination,
        }
    }
}

impl fmt::Display for MappingEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.source.display(), self.destination.display())
    }
}

/// Result of copying one file.
///
/// Failures are shared (`Arc`) because every request joined onto the same
/// in-flight copy observes the same outcome.
#[derive(Debug, Clone)]
pub enum CopyOutcome {
    Copied,
    /// Destination is at least as new as the source and `update` is set.
    Skipped,
    Failed(Arc<MirrorError>),
}

impl CopyOutcome {
    pub fn is_copied(&self) -> bool {
        matches!(self, CopyOutcome::Copied)
    }
}

/// A per-file failure recorded in a batch summary.
#[derive(Debug, Clone)]
pub struct CopyFailure {
    pub source: PathBuf,
    pub error: Arc<MirrorError>,
}

/// Aggregate result of a one-shot batch copy.
#[derive(Debug, Clone, Default)]
pub struct CopySummary {
    pub copied: usize,
    pub skipped: usize,
    pub failures: Vec<CopyFailure>,
}

impl CopySummary {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub(crate) fn record(&mut self, source: PathBuf, outcome: CopyOutcome) {
        match outcome {
            CopyOutcome::Copied => self.copied += 1,
            CopyOutcome::Skipped => self.skipped += 1,
            CopyOutcome::Failed(error) => self.failures.push(CopyFailure { source, error }),
        }
    }
}

/// Result of a clean pass: destination files that were pruned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanSummary {
    pub removed_files: Vec<PathBuf>,
    pub removed_dirs: Vec<PathBuf>,
}

/// Lifecycle of a watch session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    /// Cleaning, baseline copy, opening the subscription.
    Starting,
    /// Subscription open, events are being applied.
    Active,
    /// Subscription closed; no further events are processed.
    Stopped,
}

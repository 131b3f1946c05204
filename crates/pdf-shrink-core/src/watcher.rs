//! Polling folder watcher.
//!
//! Each cycle walks the tree once, hands every eligible PDF to the
//! [`Compressor`], then parks on the cancel signal for the poll interval.
//! Cancellation is checked before every directory entry, so a stop request
//! waits for at most the file currently being compressed.

use crate::cancel::CancelSignal;
use crate::compressor::Compressor;
use crate::config::DEFAULT_POLL_INTERVAL_SECS;
use crate::engine::COMPRESSED_SUFFIX;
use crate::outcome::{CompressionOutcome, FailureKind, SkipReason};
use crate::quality::QualityProfile;
use crate::sink::{StatusSink, Trigger};
use glob::Pattern;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

const TARGET_EXTENSION: &str = ".pdf";

/// Counters for one pass over the tree.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScanSummary {
    pub eligible: usize,
    pub compressed: usize,
    pub unchanged: usize,
    pub no_improvement: usize,
    pub failed: usize,
    pub bytes_saved: u64,
    /// The pass stopped early because of a stop request.
    pub cancelled: bool,
    /// The pass stopped early because the engine could not be used.
    pub engine_unavailable: bool,
}

impl ScanSummary {
    fn record(&mut self, outcome: &CompressionOutcome) {
        match outcome {
            CompressionOutcome::Skipped(_) => self.unchanged += 1,
            CompressionOutcome::Compressed {
                original_size,
                new_size,
            } => {
                self.compressed += 1;
                self.bytes_saved += original_size.saturating_sub(*new_size);
            }
            CompressionOutcome::NoImprovement { .. } => self.no_improvement += 1,
            CompressionOutcome::Failed(_) => self.failed += 1,
        }
    }
}

/// A PDF that is not itself the output of an earlier compression.
pub fn is_eligible(path: &Path) -> bool {
    let Some(name) = path.file_name() else {
        return false;
    };
    let name = name.to_string_lossy().to_lowercase();
    let marker = format!("{}{}", COMPRESSED_SUFFIX, TARGET_EXTENSION);
    name.ends_with(TARGET_EXTENSION) && !name.ends_with(&marker)
}

pub struct FolderWatcher {
    root: PathBuf,
    recursive: bool,
    poll_interval: Duration,
    ignore_patterns: Vec<Pattern>,
}

impl FolderWatcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            recursive: true,
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            ignore_patterns: Vec::new(),
        }
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Invalid globs are logged and dropped.
    pub fn ignore_patterns(mut self, globs: &[String]) -> Self {
        self.ignore_patterns = globs
            .iter()
            .filter_map(|glob| match Pattern::new(glob) {
                Ok(p) => Some(p),
                Err(e) => {
                    error!("Invalid glob pattern '{}': {}", glob, e);
                    None
                }
            })
            .collect();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn is_ignored(&self, path: &Path) -> bool {
        self.ignore_patterns
            .iter()
            .any(|pattern| pattern.matches_path(path))
    }

    /// Scan, wait, repeat until `cancel` is raised. There is no other exit.
    pub fn run(
        &self,
        compressor: &Compressor,
        quality: &dyn Fn() -> QualityProfile,
        cancel: &CancelSignal,
        sink: &dyn StatusSink,
    ) {
        info!("Monitoring folder: {}", self.root.display());
        while !cancel.is_cancelled() {
            let summary = self.scan_once(compressor, quality, cancel, sink);
            debug!("Scan of {} finished: {:?}", self.root.display(), summary);
            sink.on_scan_complete(&self.root, &summary);
            if summary.cancelled || cancel.wait_timeout(self.poll_interval) {
                break;
            }
        }
        info!("Stopped monitoring folder: {}", self.root.display());
    }

    /// One full pass over the tree.
    pub fn scan_once(
        &self,
        compressor: &Compressor,
        quality: &dyn Fn() -> QualityProfile,
        cancel: &CancelSignal,
        sink: &dyn StatusSink,
    ) -> ScanSummary {
        let mut summary = ScanSummary::default();
        let mut walker = WalkDir::new(&self.root).follow_links(false);
        if !self.recursive {
            walker = walker.max_depth(1);
        }

        let entries = walker
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !self.is_ignored(entry.path()));

        for entry in entries {
            if cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }

            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Error reading entry under {}: {}", self.root.display(), e);
                    continue;
                }
            };
            if !entry.file_type().is_file() || !is_eligible(entry.path()) {
                continue;
            }

            summary.eligible += 1;
            let outcome = compressor.process(entry.path(), quality());
            summary.record(&outcome);

            match &outcome {
                CompressionOutcome::Skipped(SkipReason::Unchanged) => {}
                CompressionOutcome::Failed(FailureKind::EngineUnavailable(msg)) => {
                    sink.on_outcome(entry.path(), &outcome, Trigger::Watcher);
                    error!(
                        "Ghostscript unavailable ({}), abandoning this pass over {}",
                        msg,
                        self.root.display()
                    );
                    summary.engine_unavailable = true;
                    break;
                }
                _ => sink.on_outcome(entry.path(), &outcome, Trigger::Watcher),
            }
        }

        summary
    }
}

use crate::outcome::{CompressionOutcome, TargetOutcome};
use crate::quality::QualityProfile;
use crate::watcher::ScanSummary;
use std::path::Path;

/// What started a processing attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Manual,
    Watcher,
}

/// Receiver for status lines and user-facing errors.
///
/// The CLI implements this with terminal output; tests and embedders can use
/// [`SilentSink`]. All methods have default no-op implementations.
pub trait StatusSink: Send + Sync {
    fn on_file_start(&self, _path: &Path, _profile: QualityProfile, _trigger: Trigger) {}
    fn on_outcome(&self, _path: &Path, _outcome: &CompressionOutcome, _trigger: Trigger) {}
    fn on_target_outcome(&self, _path: &Path, _target_bytes: u64, _outcome: &TargetOutcome) {}
    /// A failure the user asked for directly and should be shown prominently.
    fn on_user_error(&self, _message: &str) {}
    fn on_scan_complete(&self, _folder: &Path, _summary: &ScanSummary) {}
    fn on_watch_started(&self, _folder: &Path) {}
    fn on_watch_stopped(&self, _folder: &Path) {}
    /// Configuration changes and other informational lines.
    fn on_notice(&self, _message: &str) {}
}

/// No-op sink for silent operation.
pub struct SilentSink;

impl StatusSink for SilentSink {}

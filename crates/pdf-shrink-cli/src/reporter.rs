use chrono::Local;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use pdf_shrink_core::outcome::format_size;
use pdf_shrink_core::{
    CompressionOutcome, QualityProfile, ScanSummary, SkipReason, StatusSink, TargetOutcome,
    Trigger,
};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Terminal status sink: one timestamped line per outcome on stderr, plus a
/// spinner while a manually requested file is being compressed.
#[derive(Default)]
pub struct CliSink {
    spinner: Mutex<Option<ProgressBar>>,
}

impl CliSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn spinner(&self) -> MutexGuard<'_, Option<ProgressBar>> {
        self.spinner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn finish_spinner(&self) {
        if let Some(pb) = self.spinner().take() {
            pb.finish_and_clear();
        }
    }

    fn line(&self, marker: ColoredString, message: &str) {
        self.finish_spinner();
        eprintln!(
            "{} {} {}",
            Local::now().format("%Y-%m-%d %H:%M:%S").to_string().dimmed(),
            marker,
            message
        );
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

impl StatusSink for CliSink {
    fn on_file_start(&self, path: &Path, profile: QualityProfile, trigger: Trigger) {
        if trigger != Trigger::Manual {
            return;
        }
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            pb.set_style(style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"));
        }
        pb.set_message(format!("Compressing {} ({})...", file_name(path), profile));
        pb.enable_steady_tick(Duration::from_millis(80));
        if let Some(old) = self.spinner().replace(pb) {
            old.finish_and_clear();
        }
    }

    fn on_outcome(&self, path: &Path, outcome: &CompressionOutcome, trigger: Trigger) {
        let name = file_name(path);
        match outcome {
            CompressionOutcome::Compressed { .. } => {
                self.line("✓".green(), &format!("{}: {}", name, outcome))
            }
            CompressionOutcome::NoImprovement { .. } => {
                self.line("=".yellow(), &format!("{}: {}", name, outcome))
            }
            CompressionOutcome::Skipped(SkipReason::Unchanged) => {
                self.line("·".dimmed(), &format!("{}: already compressed", name))
            }
            CompressionOutcome::Skipped(SkipReason::InProgress) => self.line(
                "·".dimmed(),
                &format!("{}: already being compressed", name),
            ),
            // Reported through on_user_error for manual requests.
            CompressionOutcome::Failed(kind) => {
                self.finish_spinner();
                if trigger == Trigger::Watcher {
                    self.line("✗".red(), &format!("{}: {}", name, kind));
                }
            }
        }
    }

    fn on_target_outcome(&self, path: &Path, target_bytes: u64, outcome: &TargetOutcome) {
        let name = file_name(path);
        let tried = outcome
            .attempts()
            .iter()
            .map(|(profile, _)| profile.short_name())
            .collect::<Vec<_>>()
            .join(", ");
        match outcome {
            TargetOutcome::Reached { final_size, .. } => self.line(
                "✓".green(),
                &format!(
                    "{}: {} (target {}, tried: {})",
                    name,
                    format_size(*final_size),
                    format_size(target_bytes),
                    if tried.is_empty() { "none" } else { tried.as_str() }
                ),
            ),
            TargetOutcome::Missed { final_size, .. } => self.line(
                "!".yellow(),
                &format!(
                    "{}: best result {} is above target {} (tried: {})",
                    name,
                    format_size(*final_size),
                    format_size(target_bytes),
                    tried
                ),
            ),
            TargetOutcome::InProgress => self.line(
                "·".dimmed(),
                &format!("{}: already being compressed", name),
            ),
            TargetOutcome::Failed { .. } => self.finish_spinner(),
        }
    }

    fn on_user_error(&self, message: &str) {
        self.line("✗".red().bold(), &message.red().to_string());
    }

    fn on_scan_complete(&self, folder: &Path, summary: &ScanSummary) {
        if summary.compressed == 0 && summary.failed == 0 {
            return;
        }
        self.line(
            "↻".cyan(),
            &format!(
                "{}: {} compressed, {} failed, {} saved",
                folder.display(),
                summary.compressed,
                summary.failed,
                format_size(summary.bytes_saved)
            ),
        );
    }

    fn on_watch_started(&self, folder: &Path) {
        self.line(
            "▶".cyan(),
            &format!("Watching {}", folder.display().to_string().bold()),
        );
    }

    fn on_watch_stopped(&self, folder: &Path) {
        self.line("■".cyan(), &format!("Stopped watching {}", folder.display()));
    }

    fn on_notice(&self, message: &str) {
        self.line("•".cyan(), message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_sink_clears_spinner_on_outcome() {
        let sink = CliSink::default();
        sink.on_file_start(Path::new("/docs/a.pdf"), QualityProfile::Low, Trigger::Manual);
        assert!(sink.spinner().is_some());

        sink.on_outcome(
            Path::new("/docs/a.pdf"),
            &CompressionOutcome::Compressed {
                original_size: 2048,
                new_size: 1024,
            },
            Trigger::Manual,
        );
        assert!(sink.spinner().is_none());
    }

    #[test]
    fn test_watcher_files_get_no_spinner() {
        let sink = CliSink::new();
        sink.on_file_start(Path::new("/docs/b.pdf"), QualityProfile::High, Trigger::Watcher);
        assert!(sink.spinner().is_none());
    }
}

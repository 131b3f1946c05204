use crate::engine::EngineError;
use crate::quality::QualityProfile;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Size matches the last recorded decision.
    Unchanged,
    /// Another caller is already processing this path.
    InProgress,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    EngineUnavailable(String),
    EngineFailed {
        exit_code: Option<i32>,
        stderr: String,
    },
    Io(String),
}

impl From<EngineError> for FailureKind {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Unavailable(msg) => FailureKind::EngineUnavailable(msg),
            EngineError::Failed { exit_code, stderr } => {
                FailureKind::EngineFailed { exit_code, stderr }
            }
            EngineError::Io(msg) => FailureKind::Io(msg),
        }
    }
}

impl From<std::io::Error> for FailureKind {
    fn from(err: std::io::Error) -> Self {
        FailureKind::Io(err.to_string())
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::EngineUnavailable(msg) => write!(f, "Ghostscript unavailable: {}", msg),
            FailureKind::EngineFailed { exit_code, stderr } => {
                match exit_code {
                    Some(code) => write!(f, "Ghostscript failed (exit code {})", code)?,
                    None => write!(f, "Ghostscript was terminated")?,
                }
                let stderr = stderr.trim();
                if !stderr.is_empty() {
                    write!(f, ": {}", stderr)?;
                }
                Ok(())
            }
            FailureKind::Io(msg) => write!(f, "IO error: {}", msg),
        }
    }
}

/// Result of one processing attempt on one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompressionOutcome {
    Skipped(SkipReason),
    /// Original replaced by the smaller engine output.
    Compressed { original_size: u64, new_size: u64 },
    /// Engine output was not smaller and has been discarded.
    NoImprovement { original_size: u64, candidate_size: u64 },
    Failed(FailureKind),
}

impl CompressionOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, CompressionOutcome::Failed(_))
    }

    /// Size of the file on disk after this outcome, when known.
    pub fn final_size(&self) -> Option<u64> {
        match self {
            CompressionOutcome::Compressed { new_size, .. } => Some(*new_size),
            CompressionOutcome::NoImprovement { original_size, .. } => Some(*original_size),
            _ => None,
        }
    }
}

impl fmt::Display for CompressionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompressionOutcome::Skipped(SkipReason::Unchanged) => {
                write!(f, "skipped, unchanged since last run")
            }
            CompressionOutcome::Skipped(SkipReason::InProgress) => {
                write!(f, "skipped, already being processed")
            }
            CompressionOutcome::Compressed {
                original_size,
                new_size,
            } => write!(
                f,
                "compressed {} -> {}",
                format_size(*original_size),
                format_size(*new_size)
            ),
            CompressionOutcome::NoImprovement {
                original_size,
                candidate_size,
            } => write!(
                f,
                "no size reduction ({} -> {}), original kept",
                format_size(*original_size),
                format_size(*candidate_size)
            ),
            CompressionOutcome::Failed(kind) => write!(f, "failed: {}", kind),
        }
    }
}

/// Result of the staged target-size mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetOutcome {
    Reached {
        final_size: u64,
        attempts: Vec<(QualityProfile, CompressionOutcome)>,
    },
    /// Attempts exhausted; the file holds the smallest result achieved.
    Missed {
        final_size: u64,
        attempts: Vec<(QualityProfile, CompressionOutcome)>,
    },
    Failed {
        kind: FailureKind,
        attempts: Vec<(QualityProfile, CompressionOutcome)>,
    },
    /// Another caller is already processing this path.
    InProgress,
}

impl TargetOutcome {
    pub fn attempts(&self) -> &[(QualityProfile, CompressionOutcome)] {
        match self {
            TargetOutcome::Reached { attempts, .. }
            | TargetOutcome::Missed { attempts, .. }
            | TargetOutcome::Failed { attempts, .. } => attempts,
            TargetOutcome::InProgress => &[],
        }
    }

    pub fn is_reached(&self) -> bool {
        matches!(self, TargetOutcome::Reached { .. })
    }
}

/// Megabytes with two decimals, the unit the status log reports in.
pub fn format_size(bytes: u64) -> String {
    format!("{:.2}MB", bytes as f64 / (1024.0 * 1024.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_compressed() {
        let outcome = CompressionOutcome::Compressed {
            original_size: 10 * 1024 * 1024,
            new_size: 4 * 1024 * 1024,
        };
        assert_eq!(outcome.to_string(), "compressed 10.00MB -> 4.00MB");
        assert_eq!(outcome.final_size(), Some(4 * 1024 * 1024));
    }

    #[test]
    fn test_engine_error_maps_to_failure_kind() {
        let kind: FailureKind = EngineError::Failed {
            exit_code: Some(2),
            stderr: "bad pdf".into(),
        }
        .into();
        assert_eq!(kind.to_string(), "Ghostscript failed (exit code 2): bad pdf");
    }
}

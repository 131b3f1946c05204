use crate::cache::SizeCache;
use crate::engine::Engine;
use crate::outcome::{format_size, CompressionOutcome, FailureKind, SkipReason, TargetOutcome};
use crate::quality::QualityProfile;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, error, info, warn};

/// Key under which a file's size is cached: the canonical path when it can be resolved.
pub fn cache_key(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Decides, per file, whether to skip, compress and replace, or discard.
pub struct Compressor {
    engine: Arc<dyn Engine>,
    cache: Arc<SizeCache>,
    in_flight: Mutex<HashSet<PathBuf>>,
}

/// Releases the in-flight claim on a path when dropped.
struct InFlightGuard<'a> {
    set: &'a Mutex<HashSet<PathBuf>>,
    key: PathBuf,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}

impl Compressor {
    pub fn new(engine: Arc<dyn Engine>, cache: Arc<SizeCache>) -> Self {
        Self {
            engine,
            cache,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn cache(&self) -> &Arc<SizeCache> {
        &self.cache
    }

    pub fn engine(&self) -> &Arc<dyn Engine> {
        &self.engine
    }

    fn claim(&self, key: &Path) -> Option<InFlightGuard<'_>> {
        let mut set = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if !set.insert(key.to_path_buf()) {
            return None;
        }
        Some(InFlightGuard {
            set: &self.in_flight,
            key: key.to_path_buf(),
        })
    }

    /// Process one file at `profile`. Never panics or returns an error: every
    /// failure is folded into the returned outcome.
    pub fn process(&self, path: &Path, profile: QualityProfile) -> CompressionOutcome {
        let key = cache_key(path);
        let Some(_guard) = self.claim(&key) else {
            debug!("{} is already being processed", path.display());
            return CompressionOutcome::Skipped(SkipReason::InProgress);
        };

        let outcome = self
            .attempt(&key, profile, true)
            .unwrap_or_else(CompressionOutcome::Failed);
        log_outcome(path, &outcome);
        outcome
    }

    /// Try profiles from least to most aggressive until the file is at or
    /// under `target_bytes` or `max_attempts` profiles have been tried.
    /// At most [`QualityProfile::FALLBACK_ORDER`] profiles exist to try.
    ///
    /// Each attempt works on the file as left by the previous one and only
    /// replaces it when strictly smaller, so the file always ends up at the
    /// smallest size achieved.
    pub fn process_with_target(
        &self,
        path: &Path,
        target_bytes: u64,
        max_attempts: usize,
    ) -> TargetOutcome {
        let key = cache_key(path);
        let Some(_guard) = self.claim(&key) else {
            return TargetOutcome::InProgress;
        };

        let mut attempts = Vec::new();
        let current = match file_size(&key) {
            Ok(size) => size,
            Err(e) => {
                error!("Error reading {}: {}", path.display(), e);
                return TargetOutcome::Failed {
                    kind: e.into(),
                    attempts,
                };
            }
        };
        if current <= target_bytes {
            info!(
                "{} is already within target ({} <= {})",
                path.display(),
                format_size(current),
                format_size(target_bytes)
            );
            return TargetOutcome::Reached {
                final_size: current,
                attempts,
            };
        }

        // Zero attempts leaves the file untouched and reports the miss.
        let allowed = max_attempts.min(QualityProfile::FALLBACK_ORDER.len());
        for profile in QualityProfile::FALLBACK_ORDER.into_iter().take(allowed) {
            let outcome = self
                .attempt(&key, profile, false)
                .unwrap_or_else(CompressionOutcome::Failed);
            debug!("Attempt at {}: {}", profile, outcome);
            log_outcome(path, &outcome);
            attempts.push((profile, outcome.clone()));

            match outcome {
                CompressionOutcome::Failed(kind @ FailureKind::EngineUnavailable(_)) => {
                    return TargetOutcome::Failed { kind, attempts };
                }
                CompressionOutcome::Failed(_) => continue,
                other => {
                    if other.final_size().is_some_and(|size| size <= target_bytes) {
                        return TargetOutcome::Reached {
                            final_size: other.final_size().unwrap_or(current),
                            attempts,
                        };
                    }
                }
            }
        }

        match file_size(&key) {
            Ok(final_size) => {
                warn!(
                    "Target {} not reached for {} after {} attempt(s), kept {}",
                    format_size(target_bytes),
                    path.display(),
                    attempts.len(),
                    format_size(final_size)
                );
                TargetOutcome::Missed {
                    final_size,
                    attempts,
                }
            }
            Err(e) => TargetOutcome::Failed {
                kind: e.into(),
                attempts,
            },
        }
    }

    fn attempt(
        &self,
        path: &Path,
        profile: QualityProfile,
        use_memo: bool,
    ) -> Result<CompressionOutcome, FailureKind> {
        let original_size = file_size(path)?;
        if use_memo && self.cache.get(path) == Some(original_size) {
            return Ok(CompressionOutcome::Skipped(SkipReason::Unchanged));
        }

        self.engine.ensure_available()?;
        let output = self.engine.invoke(path, profile)?;
        if !output.stdout.trim().is_empty() {
            debug!("Ghostscript stdout: {}", output.stdout.trim());
        }
        if !output.stderr.trim().is_empty() {
            debug!("Ghostscript stderr: {}", output.stderr.trim());
        }

        let candidate_size = match file_size(&output.output_path) {
            Ok(size) => size,
            Err(e) => {
                discard(&output.output_path);
                return Err(e.into());
            }
        };

        if candidate_size < original_size {
            // rename() replaces the destination in one step on the same filesystem.
            if let Err(e) = fs::rename(&output.output_path, path) {
                discard(&output.output_path);
                return Err(e.into());
            }
            self.record(path, candidate_size);
            Ok(CompressionOutcome::Compressed {
                original_size,
                new_size: candidate_size,
            })
        } else {
            fs::remove_file(&output.output_path)?;
            self.record(path, original_size);
            Ok(CompressionOutcome::NoImprovement {
                original_size,
                candidate_size,
            })
        }
    }

    fn record(&self, path: &Path, size: u64) {
        if let Err(e) = self.cache.put(path, size) {
            error!("Error persisting cache entry for {}: {}", path.display(), e);
        }
    }
}

fn file_size(path: &Path) -> io::Result<u64> {
    let metadata = fs::metadata(path)?;
    if !metadata.is_file() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} is not a regular file", path.display()),
        ));
    }
    Ok(metadata.len())
}

fn discard(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != io::ErrorKind::NotFound {
            error!("Error removing {}: {}", path.display(), e);
        }
    }
}

fn log_outcome(path: &Path, outcome: &CompressionOutcome) {
    match outcome {
        CompressionOutcome::Skipped(_) => debug!("{}: {}", path.display(), outcome),
        CompressionOutcome::Compressed { new_size, .. } => info!(
            "Compressed: {} (New Size: {})",
            path.display(),
            format_size(*new_size)
        ),
        CompressionOutcome::NoImprovement { .. } => {
            warn!("No size reduction for: {}", path.display())
        }
        CompressionOutcome::Failed(kind) => {
            error!("Error compressing {}: {}", path.display(), kind)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{reserve_output_path, EngineError, EngineOutput};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Writes an output of a fixed size on every call.
    struct FixedEngine {
        output_size: usize,
        calls: AtomicUsize,
    }

    impl Engine for FixedEngine {
        fn ensure_available(&self) -> Result<(), EngineError> {
            Ok(())
        }

        fn invoke(&self, input: &Path, _profile: QualityProfile) -> Result<EngineOutput, EngineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let output_path =
                reserve_output_path(input).map_err(|e| EngineError::Io(e.to_string()))?;
            fs::write(&output_path, vec![b'x'; self.output_size])
                .map_err(|e| EngineError::Io(e.to_string()))?;
            Ok(EngineOutput {
                output_path,
                stdout: String::new(),
                stderr: String::new(),
                exit_code: 0,
            })
        }
    }

    #[test]
    fn test_directory_is_not_processed() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(FixedEngine {
            output_size: 1,
            calls: AtomicUsize::new(0),
        });
        let compressor = Compressor::new(engine.clone(), Arc::new(SizeCache::in_memory()));
        let outcome = compressor.process(dir.path(), QualityProfile::Low);
        assert!(matches!(outcome, CompressionOutcome::Failed(FailureKind::Io(_))));
        assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_claimed_path_reports_in_progress() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.pdf");
        fs::write(&file, vec![b'a'; 100]).unwrap();
        let engine = Arc::new(FixedEngine {
            output_size: 10,
            calls: AtomicUsize::new(0),
        });
        let compressor = Compressor::new(engine.clone(), Arc::new(SizeCache::in_memory()));

        let key = cache_key(&file);
        let guard = compressor.claim(&key).unwrap();
        assert_eq!(
            compressor.process(&file, QualityProfile::Low),
            CompressionOutcome::Skipped(SkipReason::InProgress)
        );
        assert_eq!(
            compressor.process_with_target(&file, 5, 4),
            TargetOutcome::InProgress
        );
        drop(guard);

        assert!(matches!(
            compressor.process(&file, QualityProfile::Low),
            CompressionOutcome::Compressed { new_size: 10, .. }
        ));
        assert_eq!(engine.calls.load(Ordering::SeqCst), 1);
    }
}

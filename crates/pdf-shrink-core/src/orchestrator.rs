use crate::cache::{SizeCache, SqliteSizeStore};
use crate::cancel::CancelSignal;
use crate::compressor::Compressor;
use crate::config::{AppConfig, ConfigStore};
use crate::engine::GhostscriptEngine;
use crate::error::Error;
use crate::outcome::{CompressionOutcome, TargetOutcome};
use crate::quality::QualityProfile;
use crate::sink::{StatusSink, Trigger};
use crate::watcher::FolderWatcher;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// How long `stop_watch` waits for the watcher thread before abandoning it.
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchStart {
    Started,
    AlreadyWatching,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchStop {
    Stopped,
    /// The thread did not exit in time and was detached.
    TimedOut,
    NotWatching,
}

struct WatchSession {
    folder: PathBuf,
    cancel: CancelSignal,
    handle: JoinHandle<()>,
    exited: Receiver<()>,
}

impl WatchSession {
    fn is_active(&self) -> bool {
        !self.handle.is_finished()
    }
}

/// Owns configuration, the compressor and the single watch session.
pub struct Orchestrator {
    config: Arc<Mutex<AppConfig>>,
    store: Option<ConfigStore>,
    compressor: Arc<Compressor>,
    sink: Arc<dyn StatusSink>,
    session: Mutex<Option<WatchSession>>,
    stop_timeout: Duration,
}

impl Orchestrator {
    /// `store` is where configuration changes are persisted; `None` keeps them in memory.
    pub fn new(
        config: AppConfig,
        store: Option<ConfigStore>,
        compressor: Arc<Compressor>,
        sink: Arc<dyn StatusSink>,
    ) -> Self {
        Self {
            config: Arc::new(Mutex::new(config)),
            store,
            compressor,
            sink,
            session: Mutex::new(None),
            stop_timeout: DEFAULT_STOP_TIMEOUT,
        }
    }

    /// Load configuration and the processed-file cache from their durable
    /// locations and wire up Ghostscript.
    pub fn open(store: ConfigStore, sink: Arc<dyn StatusSink>) -> Result<Self, Error> {
        let config = store.load()?;
        let cache_path = store.cache_path(&config);
        let cache = SizeCache::load(Box::new(SqliteSizeStore::open(&cache_path)?))?;
        info!(
            "Loaded {} processed file record(s) from {}",
            cache.len(),
            cache_path.display()
        );
        let engine = GhostscriptEngine::new(config.engine_path.clone());
        let compressor = Arc::new(Compressor::new(Arc::new(engine), Arc::new(cache)));
        Ok(Self::new(config, Some(store), compressor, sink))
    }

    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    pub fn config(&self) -> AppConfig {
        lock(&self.config).clone()
    }

    pub fn compressor(&self) -> &Arc<Compressor> {
        &self.compressor
    }

    /// Compress one file synchronously. Failures are also reported to the
    /// sink as user-facing errors.
    pub fn compress_one(&self, path: &Path, profile: Option<QualityProfile>) -> CompressionOutcome {
        let profile = profile.unwrap_or_else(|| lock(&self.config).quality);
        self.sink.on_file_start(path, profile, Trigger::Manual);
        let outcome = self.compressor.process(path, profile);
        self.sink.on_outcome(path, &outcome, Trigger::Manual);
        if let CompressionOutcome::Failed(kind) = &outcome {
            self.sink.on_user_error(&format!(
                "Failed to compress {}: {}",
                path.display(),
                kind
            ));
        }
        outcome
    }

    pub fn compress_to_target(
        &self,
        path: &Path,
        target_bytes: u64,
        max_attempts: usize,
    ) -> TargetOutcome {
        self.sink
            .on_file_start(path, QualityProfile::FALLBACK_ORDER[0], Trigger::Manual);
        let outcome = self
            .compressor
            .process_with_target(path, target_bytes, max_attempts);
        self.sink.on_target_outcome(path, target_bytes, &outcome);
        if let TargetOutcome::Failed { kind, .. } = &outcome {
            self.sink.on_user_error(&format!(
                "Failed to compress {}: {}",
                path.display(),
                kind
            ));
        }
        outcome
    }

    /// Start the background watcher on `folder`. A no-op while a session is active.
    pub fn start_watch(&self, folder: &Path) -> Result<WatchStart, Error> {
        if !folder.is_dir() {
            return Err(Error::WatchFolder(folder.to_path_buf()));
        }

        let mut session = lock(&self.session);
        if let Some(active) = session.as_ref().filter(|s| s.is_active()) {
            debug!("Already watching {}", active.folder.display());
            return Ok(WatchStart::AlreadyWatching);
        }

        let watcher = {
            let config = lock(&self.config);
            FolderWatcher::new(folder)
                .recursive(config.recursive)
                .poll_interval(config.poll_interval())
                .ignore_patterns(&config.ignore_patterns)
        };

        let cancel = CancelSignal::new();
        let (exit_tx, exit_rx) = mpsc::channel();
        let compressor = Arc::clone(&self.compressor);
        let config = Arc::clone(&self.config);
        let sink = Arc::clone(&self.sink);
        let worker_cancel = cancel.clone();

        let handle = thread::Builder::new()
            .name("folder-watcher".to_string())
            .spawn(move || {
                let quality = || lock(&config).quality;
                watcher.run(&compressor, &quality, &worker_cancel, sink.as_ref());
                let _ = exit_tx.send(());
            })?;

        *session = Some(WatchSession {
            folder: folder.to_path_buf(),
            cancel,
            handle,
            exited: exit_rx,
        });
        drop(session);

        self.sink.on_watch_started(folder);
        Ok(WatchStart::Started)
    }

    /// Signal the watcher and wait up to the stop timeout for it to exit.
    /// The session is cleared either way.
    pub fn stop_watch(&self) -> WatchStop {
        let Some(session) = lock(&self.session).take() else {
            return WatchStop::NotWatching;
        };

        session.cancel.cancel();
        let result = match session.exited.recv_timeout(self.stop_timeout) {
            // A panicking worker drops the sender without sending.
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if session.handle.join().is_err() {
                    warn!("Watcher thread for {} panicked", session.folder.display());
                }
                WatchStop::Stopped
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    "Watcher for {} did not stop within {:?}, detaching it",
                    session.folder.display(),
                    self.stop_timeout
                );
                WatchStop::TimedOut
            }
        };
        self.sink.on_watch_stopped(&session.folder);
        result
    }

    pub fn is_watching(&self) -> bool {
        lock(&self.session).as_ref().is_some_and(|s| s.is_active())
    }

    pub fn watched_folder(&self) -> Option<PathBuf> {
        lock(&self.session)
            .as_ref()
            .filter(|s| s.is_active())
            .map(|s| s.folder.clone())
    }

    /// Persist the folder and, with auto monitoring on, move the watch there.
    pub fn set_default_folder(&self, folder: &Path) -> Result<(), Error> {
        if !folder.is_dir() {
            return Err(Error::WatchFolder(folder.to_path_buf()));
        }
        let config = self.update_config(|c| c.default_folder = folder.to_string_lossy().into_owned())?;
        self.sink
            .on_notice(&format!("Monitoring folder: {}", folder.display()));

        if config.auto_monitoring {
            if self.watched_folder().is_some_and(|f| f != folder) {
                self.stop_watch();
            }
            self.start_watch(folder)?;
        }
        Ok(())
    }

    /// Persist the flag and start or stop the watcher to match.
    pub fn set_auto_monitoring(&self, enabled: bool) -> Result<(), Error> {
        let config = self.update_config(|c| c.auto_monitoring = enabled)?;
        if enabled {
            self.sink.on_notice("Auto-monitoring enabled.");
            if let Some(folder) = config.default_folder() {
                self.start_watch(&folder)?;
            }
        } else {
            self.sink.on_notice("Auto-monitoring disabled.");
            self.stop_watch();
        }
        Ok(())
    }

    /// Stored for front ends that support it; has no effect on the core.
    pub fn set_minimize_on_startup(&self, enabled: bool) -> Result<(), Error> {
        self.update_config(|c| c.minimize_on_startup = enabled)?;
        self.sink.on_notice(if enabled {
            "Will start minimized."
        } else {
            "Will not start minimized."
        });
        Ok(())
    }

    /// Takes effect for the next file, including inside a running watch.
    pub fn set_default_quality(&self, quality: QualityProfile) -> Result<(), Error> {
        self.update_config(|c| c.quality = quality)?;
        self.sink
            .on_notice(&format!("Default PDF quality set to: {}", quality));
        Ok(())
    }

    /// Start-up hook: resume watching when auto monitoring was left on.
    pub fn resume(&self) -> Result<Option<WatchStart>, Error> {
        let config = self.config();
        match config.default_folder() {
            Some(folder) if config.auto_monitoring => self.start_watch(&folder).map(Some),
            _ => Ok(None),
        }
    }

    pub fn shutdown(&self) {
        if self.stop_watch() != WatchStop::NotWatching {
            info!("Watcher stopped for shutdown");
        }
    }

    fn update_config(&self, change: impl FnOnce(&mut AppConfig)) -> Result<AppConfig, Error> {
        let snapshot = {
            let mut config = lock(&self.config);
            change(&mut config);
            config.clone()
        };
        if let Some(store) = &self.store {
            store.save(&snapshot)?;
        }
        Ok(snapshot)
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

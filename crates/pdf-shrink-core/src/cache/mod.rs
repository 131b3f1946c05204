//! Processed-file cache: last known size of every file a decision was made for.
//!
//! The whole mapping is loaded once; every `put` is written through to the
//! backing store before the lock is released, so a crash loses at most the
//! decision that was in progress.

mod sqlite;

pub use sqlite::SqliteSizeStore;

use crate::error::Error;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::trace;

/// Durable key-value backing for [`SizeCache`].
pub trait SizeStore: Send {
    fn load_all(&mut self) -> Result<HashMap<PathBuf, u64>, Error>;
    fn put(&mut self, path: &Path, size_bytes: u64) -> Result<(), Error>;
    fn clear(&mut self) -> Result<(), Error>;
}

/// Volatile store, for one-off runs and tests.
#[derive(Debug, Default)]
pub struct MemorySizeStore {
    entries: HashMap<PathBuf, u64>,
}

impl MemorySizeStore {
    pub fn with_entries(entries: HashMap<PathBuf, u64>) -> Self {
        Self { entries }
    }
}

impl SizeStore for MemorySizeStore {
    fn load_all(&mut self) -> Result<HashMap<PathBuf, u64>, Error> {
        Ok(self.entries.clone())
    }

    fn put(&mut self, path: &Path, size_bytes: u64) -> Result<(), Error> {
        self.entries.insert(path.to_path_buf(), size_bytes);
        Ok(())
    }

    fn clear(&mut self) -> Result<(), Error> {
        self.entries.clear();
        Ok(())
    }
}

struct CacheState {
    entries: HashMap<PathBuf, u64>,
    store: Box<dyn SizeStore>,
}

pub struct SizeCache {
    state: Mutex<CacheState>,
}

impl SizeCache {
    /// Eagerly load every record from `store`.
    pub fn load(mut store: Box<dyn SizeStore>) -> Result<Self, Error> {
        let entries = store.load_all()?;
        trace!("Loaded {} processed file records", entries.len());
        Ok(Self {
            state: Mutex::new(CacheState { entries, store }),
        })
    }

    pub fn in_memory() -> Self {
        Self {
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                store: Box::new(MemorySizeStore::default()),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, path: &Path) -> Option<u64> {
        self.lock().entries.get(path).copied()
    }

    /// Record `size_bytes` for `path` and persist it immediately.
    ///
    /// The in-memory entry is updated even when the store write fails, since
    /// the file on disk already reflects the decision.
    pub fn put(&self, path: &Path, size_bytes: u64) -> Result<(), Error> {
        let mut state = self.lock();
        state.entries.insert(path.to_path_buf(), size_bytes);
        state.store.put(path, size_bytes)
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) -> Result<(), Error> {
        let mut state = self.lock();
        state.entries.clear();
        state.store.clear()
    }
}

#![allow(dead_code)]

use pdf_shrink_core::engine::{reserve_output_path, Engine, EngineError, EngineOutput};
use pdf_shrink_core::QualityProfile;
use std::collections::HashMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

pub const MB: u64 = 1024 * 1024;

#[derive(Debug, Clone, Copy)]
pub enum Behaviour {
    Output(u64),
    Fail(i32),
}

/// In-process stand-in for Ghostscript with a per-profile plan.
pub struct ScriptedEngine {
    plan: HashMap<QualityProfile, Behaviour>,
    fallback: Behaviour,
    available: AtomicBool,
    delay: Duration,
    calls: AtomicUsize,
    invocations: Mutex<Vec<(PathBuf, QualityProfile)>>,
}

impl ScriptedEngine {
    pub fn producing(size: u64) -> Self {
        Self::with_fallback(Behaviour::Output(size))
    }

    pub fn failing(exit_code: i32) -> Self {
        Self::with_fallback(Behaviour::Fail(exit_code))
    }

    pub fn unavailable() -> Self {
        let engine = Self::producing(1);
        engine.available.store(false, Ordering::SeqCst);
        engine
    }

    fn with_fallback(fallback: Behaviour) -> Self {
        Self {
            plan: HashMap::new(),
            fallback,
            available: AtomicBool::new(true),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            invocations: Mutex::new(Vec::new()),
        }
    }

    pub fn with_profile(mut self, profile: QualityProfile, size: u64) -> Self {
        self.plan.insert(profile, Behaviour::Output(size));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn profiles_used(&self) -> Vec<QualityProfile> {
        self.invocations
            .lock()
            .unwrap()
            .iter()
            .map(|(_, p)| *p)
            .collect()
    }

    pub fn paths_used(&self) -> Vec<PathBuf> {
        self.invocations
            .lock()
            .unwrap()
            .iter()
            .map(|(p, _)| p.clone())
            .collect()
    }
}

impl Engine for ScriptedEngine {
    fn ensure_available(&self) -> Result<(), EngineError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(EngineError::Unavailable("Ghostscript not found".into()))
        }
    }

    fn invoke(&self, input: &Path, profile: QualityProfile) -> Result<EngineOutput, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.invocations
            .lock()
            .unwrap()
            .push((input.to_path_buf(), profile));
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }

        match self.plan.get(&profile).copied().unwrap_or(self.fallback) {
            Behaviour::Output(size) => {
                let output_path = reserve_output_path(input)
                    .map_err(|e| EngineError::Io(e.to_string()))?;
                write_sized(&output_path, size);
                Ok(EngineOutput {
                    output_path,
                    stdout: String::new(),
                    stderr: String::new(),
                    exit_code: 0,
                })
            }
            Behaviour::Fail(code) => Err(EngineError::Failed {
                exit_code: Some(code),
                stderr: "Error: /syntaxerror in pdf".into(),
            }),
        }
    }
}

/// Create `path` with exactly `size` bytes.
pub fn write_sized(path: &Path, size: u64) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    let file = File::create(path).unwrap();
    file.set_len(size).unwrap();
}

pub fn size_of(path: &Path) -> u64 {
    fs::metadata(path).unwrap().len()
}

/// Poll `condition` until it holds or `timeout` elapses.
pub fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    condition()
}

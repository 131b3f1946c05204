//! External compression engine seam.

mod ghostscript;

pub use ghostscript::{build_args, GhostscriptEngine};

use crate::quality::QualityProfile;
use std::ffi::OsString;
use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name marker carried by every engine output file.
pub const COMPRESSED_SUFFIX: &str = "_compressed";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("compression engine unavailable: {0}")]
    Unavailable(String),

    #[error("compression engine failed (exit code {}): {}", display_code(.exit_code), .stderr.trim())]
    Failed {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("IO error around engine invocation: {0}")]
    Io(String),
}

fn display_code(code: &Option<i32>) -> String {
    code.map_or_else(|| "unknown".to_string(), |c| c.to_string())
}

/// Result of one successful engine run. The input file is untouched.
#[derive(Debug, Clone)]
pub struct EngineOutput {
    pub output_path: PathBuf,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

pub trait Engine: Send + Sync {
    /// Resolve the engine and confirm it answers a version query.
    fn ensure_available(&self) -> Result<(), EngineError>;

    /// Compress `input` into a path obtained from [`reserve_output_path`].
    fn invoke(&self, input: &Path, profile: QualityProfile) -> Result<EngineOutput, EngineError>;
}

/// Highest numbered sibling tried before giving up on finding a free output name.
const MAX_OUTPUT_CANDIDATES: u32 = 1000;

/// `<dir>/<stem>_compressed<.ext>` for a given input.
pub fn output_path_for(input: &Path) -> PathBuf {
    output_candidate(input, 0)
}

/// `attempt` 0 is [`output_path_for`]; later ones are `<stem>-<n>_compressed<.ext>`,
/// so every candidate still carries the marker and is never picked up by the watcher.
fn output_candidate(input: &Path, attempt: u32) -> PathBuf {
    let mut name: OsString = input
        .file_stem()
        .map(|s| s.to_os_string())
        .unwrap_or_default();
    if attempt > 0 {
        name.push(format!("-{}", attempt));
    }
    name.push(COMPRESSED_SUFFIX);
    if let Some(ext) = input.extension() {
        name.push(".");
        name.push(ext);
    }
    input.with_file_name(name)
}

/// Create an empty output file next to `input` under the first free
/// candidate name and return its path.
///
/// Existing files are never opened or removed: a `<stem>_compressed.pdf`
/// already in the folder belongs to the user. The caller owns the returned
/// file and must remove it when the run does not succeed. Being a sibling,
/// it can replace `input` with a single rename.
pub fn reserve_output_path(input: &Path) -> io::Result<PathBuf> {
    for attempt in 0..=MAX_OUTPUT_CANDIDATES {
        let candidate = output_candidate(input, attempt);
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&candidate)
        {
            Ok(_) => return Ok(candidate),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e),
        }
    }
    Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("no free output name next to {}", input.display()),
    ))
}

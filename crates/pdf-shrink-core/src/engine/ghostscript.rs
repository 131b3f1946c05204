use super::{reserve_output_path, Engine, EngineError, EngineOutput};
use crate::platform;
use crate::quality::QualityProfile;
use std::env;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, error, info, warn};

/// Argument vector for one compression run, excluding the executable.
pub fn build_args(input: &Path, output: &Path, profile: QualityProfile) -> Vec<OsString> {
    let mut out_arg = OsString::from("-sOutputFile=");
    out_arg.push(output.as_os_str());
    vec![
        OsString::from("-sDEVICE=pdfwrite"),
        OsString::from("-dCompatibilityLevel=1.4"),
        OsString::from(format!("-dPDFSETTINGS=/{}", profile.preset())),
        OsString::from("-dNOPAUSE"),
        OsString::from("-dQUIET"),
        OsString::from("-dBATCH"),
        out_arg,
        input.as_os_str().to_os_string(),
    ]
}

#[derive(Debug, Clone)]
struct ResolvedEngine {
    executable: PathBuf,
    version: String,
}

/// Ghostscript invoked as a subprocess.
///
/// The executable is looked up as: a binary bundled next to the running
/// program, the user-configured path, then the system `PATH`. The first
/// successful lookup plus version check is remembered for the lifetime of
/// the engine; failures are not, so installing Ghostscript while the program
/// runs is picked up on the next attempt.
pub struct GhostscriptEngine {
    configured_path: Option<PathBuf>,
    bundled_dir: Option<PathBuf>,
    resolved: Mutex<Option<ResolvedEngine>>,
}

impl GhostscriptEngine {
    pub fn new(configured_path: Option<PathBuf>) -> Self {
        let bundled_dir = env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf));
        Self {
            configured_path,
            bundled_dir,
            resolved: Mutex::new(None),
        }
    }

    /// Override where a bundled binary is looked for. `None` disables the bundled lookup.
    pub fn with_bundled_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.bundled_dir = dir;
        self
    }

    /// Find the executable without running it.
    pub fn locate(&self) -> Option<PathBuf> {
        if let Some(dir) = &self.bundled_dir {
            let candidates = [
                dir.join(platform::BUNDLED_ENGINE_NAME),
                dir.join("ghostscript").join(platform::BUNDLED_ENGINE_NAME),
            ];
            if let Some(found) = candidates.into_iter().find(|p| p.is_file()) {
                return Some(found);
            }
        }

        if let Some(configured) = &self.configured_path {
            if configured.is_file() {
                return Some(configured.clone());
            }
            warn!(
                "Configured Ghostscript path {} does not exist",
                configured.display()
            );
        }

        platform::ENGINE_NAMES
            .iter()
            .find_map(|name| find_in_path(name))
    }

    /// Resolved executable and its reported version, running the version query if needed.
    pub fn version(&self) -> Result<(PathBuf, String), EngineError> {
        let resolved = self.resolve()?;
        Ok((resolved.executable, resolved.version))
    }

    fn resolve(&self) -> Result<ResolvedEngine, EngineError> {
        let mut slot = self.resolved.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(resolved) = slot.as_ref() {
            return Ok(resolved.clone());
        }

        let executable = self.locate().ok_or_else(|| {
            EngineError::Unavailable("Ghostscript not found (bundled, configured or on PATH)".into())
        })?;
        let version = query_version(&executable)?;
        info!(
            "Using Ghostscript {} at {}",
            version,
            executable.display()
        );
        let resolved = ResolvedEngine {
            executable,
            version,
        };
        *slot = Some(resolved.clone());
        Ok(resolved)
    }
}

impl Engine for GhostscriptEngine {
    fn ensure_available(&self) -> Result<(), EngineError> {
        self.resolve().map(|_| ())
    }

    fn invoke(&self, input: &Path, profile: QualityProfile) -> Result<EngineOutput, EngineError> {
        let executable = self.resolve()?.executable;
        let output_path =
            reserve_output_path(input).map_err(|e| EngineError::Io(e.to_string()))?;

        let mut cmd = Command::new(&executable);
        cmd.args(build_args(input, &output_path, profile))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        platform::hide_console_window(&mut cmd);

        debug!(
            "Running {} at /{} on {}",
            executable.display(),
            profile.preset(),
            input.display()
        );
        let output = match cmd.output() {
            Ok(output) => output,
            Err(e) => {
                discard_output(&output_path);
                return Err(EngineError::Unavailable(format!(
                    "failed to execute {}: {}",
                    executable.display(),
                    e
                )));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            discard_output(&output_path);
            return Err(EngineError::Failed {
                exit_code: output.status.code(),
                stderr,
            });
        }

        // The reserved file exists from the start, so "nothing written" shows up as empty.
        let written = fs::metadata(&output_path).map(|m| m.len()).unwrap_or(0);
        if written == 0 {
            discard_output(&output_path);
            return Err(EngineError::Failed {
                exit_code: output.status.code(),
                stderr: format!(
                    "engine reported success but wrote nothing to {}",
                    output_path.display()
                ),
            });
        }

        Ok(EngineOutput {
            output_path,
            stdout,
            stderr,
            exit_code: output.status.code().unwrap_or(0),
        })
    }
}

fn query_version(executable: &Path) -> Result<String, EngineError> {
    let mut cmd = Command::new(executable);
    cmd.arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    platform::hide_console_window(&mut cmd);

    let output: Output = cmd.output().map_err(|e| {
        EngineError::Unavailable(format!(
            "version check of {} failed: {}",
            executable.display(),
            e
        ))
    })?;
    if !output.status.success() {
        return Err(EngineError::Unavailable(format!(
            "version check of {} exited with {}: {}",
            executable.display(),
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

fn find_in_path(name: &str) -> Option<PathBuf> {
    let paths = env::var_os("PATH")?;
    env::split_paths(&paths)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

fn discard_output(path: &Path) {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => {
            error!("Error removing engine output {}: {}", path.display(), e)
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_args_matches_engine_contract() {
        let args = build_args(
            Path::new("/in/a.pdf"),
            Path::new("/in/a_compressed.pdf"),
            QualityProfile::Balanced,
        );
        let args: Vec<String> = args
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            vec![
                "-sDEVICE=pdfwrite",
                "-dCompatibilityLevel=1.4",
                "-dPDFSETTINGS=/ebook",
                "-dNOPAUSE",
                "-dQUIET",
                "-dBATCH",
                "-sOutputFile=/in/a_compressed.pdf",
                "/in/a.pdf",
            ]
        );
    }

    #[test]
    fn test_missing_configured_engine_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let engine = GhostscriptEngine::new(Some(dir.path().join("no-such-gs")))
            .with_bundled_dir(Some(dir.path().to_path_buf()));
        // Only meaningful when no gs is installed system-wide.
        if find_in_path(platform::ENGINE_NAMES[0]).is_none() {
            assert!(matches!(
                engine.ensure_available(),
                Err(EngineError::Unavailable(_))
            ));
        }
    }

    #[test]
    fn test_bundled_binary_takes_precedence() {
        let bundled = tempfile::tempdir().unwrap();
        let configured = tempfile::tempdir().unwrap();
        let bundled_gs = bundled.path().join(platform::BUNDLED_ENGINE_NAME);
        let configured_gs = configured.path().join("my-gs");
        fs::write(&bundled_gs, b"").unwrap();
        fs::write(&configured_gs, b"").unwrap();

        let engine = GhostscriptEngine::new(Some(configured_gs.clone()))
            .with_bundled_dir(Some(bundled.path().to_path_buf()));
        assert_eq!(engine.locate(), Some(bundled_gs.clone()));

        fs::remove_file(&bundled_gs).unwrap();
        assert_eq!(engine.locate(), Some(configured_gs));
    }
}

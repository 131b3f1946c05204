use crate::error::Error;
use crate::quality::QualityProfile;
use config::{Config, Environment, File as ConfigFile, FileFormat};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;
/// Longest pause between scans; larger configured values are capped to this.
pub const MAX_POLL_INTERVAL_SECS: u64 = 24 * 60 * 60;

const CONFIG_PATH_VAR: &str = "PDF_SHRINK_CONFIG";
const ENV_PREFIX: &str = "PDF_SHRINK";
const CACHE_FILE_NAME: &str = "processed.db";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Folder watched by auto monitoring; empty when unset.
    pub default_folder: String,
    pub auto_monitoring: bool,
    pub minimize_on_startup: bool,
    pub quality: QualityProfile,
    /// Ghostscript executable to use when none is bundled.
    pub engine_path: Option<PathBuf>,
    /// Processed-file cache location; next to the config file when unset.
    pub cache_path: Option<PathBuf>,
    pub poll_interval_secs: u64,
    pub recursive: bool,
    /// Glob patterns for paths the watcher never touches.
    pub ignore_patterns: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_folder: String::new(),
            auto_monitoring: false,
            minimize_on_startup: false,
            quality: QualityProfile::Low,
            engine_path: None,
            cache_path: None,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            recursive: true,
            ignore_patterns: Vec::new(),
        }
    }
}

impl AppConfig {
    pub fn default_folder(&self) -> Option<PathBuf> {
        let trimmed = self.default_folder.trim();
        (!trimmed.is_empty()).then(|| PathBuf::from(trimmed))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.clamp(1, MAX_POLL_INTERVAL_SECS))
    }
}

/// TOML file holding [`AppConfig`], rewritten on every change.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `$PDF_SHRINK_CONFIG`, else `<config dir>/pdf-shrink/config.toml`.
    pub fn default_location() -> PathBuf {
        if let Ok(path) = env::var(CONFIG_PATH_VAR) {
            return PathBuf::from(path);
        }
        dirs::config_dir()
            .map(|dir| dir.join("pdf-shrink").join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("pdf-shrink.toml"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the file if present, applying `PDF_SHRINK_*` environment overrides.
    /// Missing fields fall back to [`AppConfig::default`].
    pub fn load(&self) -> Result<AppConfig, Error> {
        let builder = Config::builder()
            .add_source(
                ConfigFile::from(self.path.as_path())
                    .format(FileFormat::Toml)
                    .required(false),
            )
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("ignore_patterns"),
            )
            .build()?;
        let config = builder.try_deserialize::<AppConfig>()?;
        debug!("Loaded configuration from {}", self.path.display());
        Ok(config)
    }

    /// Write through a temporary sibling so a crash never leaves a truncated file.
    pub fn save(&self, config: &AppConfig) -> Result<(), Error> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(config)?;
        let tmp = self.path.with_extension("toml.tmp");
        fs::write(&tmp, contents)?;
        fs::rename(&tmp, &self.path)?;
        debug!("Saved configuration to {}", self.path.display());
        Ok(())
    }

    pub fn cache_path(&self, config: &AppConfig) -> PathBuf {
        match &config.cache_path {
            Some(path) => path.clone(),
            None => self.path.with_file_name(CACHE_FILE_NAME),
        }
    }
}

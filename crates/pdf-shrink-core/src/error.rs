use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Configuration write error: {0}")]
    ConfigWrite(#[from] toml::ser::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Watch folder does not exist: {}", .0.display())]
    WatchFolder(PathBuf),

    #[error("{0}")]
    Other(String),
}

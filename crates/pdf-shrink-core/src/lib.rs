pub mod cache;
pub mod cancel;
pub mod compressor;
pub mod config;
pub mod engine;
pub mod error;
pub mod orchestrator;
pub mod outcome;
pub mod platform;
pub mod quality;
pub mod sink;
pub mod watcher;

pub use cache::SizeCache;
pub use compressor::Compressor;
pub use config::{AppConfig, ConfigStore};
pub use engine::{Engine, GhostscriptEngine};
pub use error::Error;
pub use orchestrator::{Orchestrator, WatchStart, WatchStop};
pub use outcome::{CompressionOutcome, FailureKind, SkipReason, TargetOutcome};
pub use quality::QualityProfile;
pub use sink::{SilentSink, StatusSink, Trigger};
pub use watcher::{FolderWatcher, ScanSummary};

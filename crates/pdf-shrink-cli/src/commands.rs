use crate::size::parse_size;
use clap::{Parser, Subcommand, ValueEnum};
use pdf_shrink_core::QualityProfile;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "pdf-shrink", version)]
#[command(about = "Shrink PDF files with Ghostscript, one at a time or by watching a folder", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Compress a single PDF in place
    Compress {
        file: PathBuf,
        /// Quality profile (low, balanced, high, very-high); defaults to the configured one
        #[arg(short, long)]
        quality: Option<QualityProfile>,
        /// Step down through the profiles until the file is at most this size (e.g. 2MB)
        #[arg(short, long, value_parser = parse_size)]
        target_size: Option<u64>,
        /// Profiles to try when a target size is given (1 to 4)
        #[arg(
            long,
            default_value_t = 4,
            requires = "target_size",
            value_parser = clap::value_parser!(u64).range(1..=4)
        )]
        max_attempts: u64,
    },
    /// Watch a folder in the foreground until Enter is pressed
    Watch {
        /// Defaults to the configured folder
        folder: Option<PathBuf>,
        /// Also stored as the default quality
        #[arg(short, long)]
        quality: Option<QualityProfile>,
    },
    /// Set the folder to monitor
    SetFolder { folder: PathBuf },
    /// Set the default quality profile
    SetQuality { quality: QualityProfile },
    /// Turn monitoring of the configured folder at startup on or off
    AutoMonitor { state: Toggle },
    /// Stored for graphical front ends
    MinimizeOnStartup { state: Toggle },
    /// Resume auto monitoring if enabled and wait until Enter is pressed
    Run,
    /// Print configuration values
    PrintConfig,
    /// Display the number of processed file records
    CountCache,
    /// Forget every processed file record
    ClearCache,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Toggle {
    On,
    Off,
}

impl Toggle {
    pub fn enabled(self) -> bool {
        self == Toggle::On
    }
}

mod commands;
mod logging;
mod reporter;
mod size;

use std::io::{self, Write};
use std::path::Path;
use std::process;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use colored::*;
use commands::{Cli, Commands};
use dotenv::dotenv;
use pdf_shrink_core::outcome::format_size;
use pdf_shrink_core::{ConfigStore, Orchestrator, QualityProfile, WatchStart};
use reporter::CliSink;
use tracing::{error, info};

fn main() {
    dotenv().ok();

    let guard = logging::init_logger();

    let args = Cli::parse();

    if let Err(err) = run(args.command.unwrap_or(Commands::Run)) {
        error!("Error: {:#}", err);
        drop(guard);
        process::exit(1);
    }
}

fn run(command: Commands) -> Result<()> {
    let store = ConfigStore::new(ConfigStore::default_location());
    let config_path = store.path().display().to_string();
    let orchestrator = Orchestrator::open(store, Arc::new(CliSink::new()))
        .with_context(|| format!("Cannot open configuration or processed-file cache for {}", config_path))?;

    match command {
        Commands::Compress {
            file,
            quality,
            target_size: Some(target),
            max_attempts,
        } => {
            if quality.is_some() {
                info!("--quality is ignored when a target size is given");
            }
            let outcome = orchestrator.compress_to_target(
                &file,
                target,
                usize::try_from(max_attempts).unwrap_or(usize::MAX),
            );
            if !outcome.is_reached() {
                bail!(
                    "{} was not brought under {}",
                    file.display(),
                    format_size(target)
                );
            }
        }
        Commands::Compress { file, quality, .. } => {
            let outcome = orchestrator.compress_one(&file, quality);
            if outcome.is_failure() {
                bail!("compression of {} failed", file.display());
            }
        }
        Commands::Watch { folder, quality } => {
            if let Some(quality) = quality {
                orchestrator.set_default_quality(quality)?;
            }
            let folder = match folder.or_else(|| orchestrator.config().default_folder()) {
                Some(folder) => folder,
                None => bail!("No folder given and none configured; use `set-folder` first"),
            };
            orchestrator
                .start_watch(&folder)
                .with_context(|| format!("Cannot watch {}", folder.display()))?;
            wait_for_enter("Press Enter to stop watching.")?;
            orchestrator.shutdown();
        }
        Commands::SetFolder { folder } => orchestrator
            .set_default_folder(&folder)
            .with_context(|| format!("Cannot monitor {}", folder.display()))?,
        Commands::SetQuality { quality } => orchestrator.set_default_quality(quality)?,
        Commands::AutoMonitor { state } => orchestrator.set_auto_monitoring(state.enabled())?,
        Commands::MinimizeOnStartup { state } => {
            orchestrator.set_minimize_on_startup(state.enabled())?
        }
        Commands::Run => run_lifecycle(&orchestrator)?,
        Commands::PrintConfig => {
            println!("Configuration file: {}", config_path);
            println!("Configuration: {:#?}", orchestrator.config());
        }
        Commands::CountCache => {
            let count = orchestrator.compressor().cache().len();
            println!("{} processed file record(s)", format!("{}", count).cyan());
        }
        Commands::ClearCache => {
            if prompt_confirm(
                "Are you SURE you want to forget every processed file?",
                Some(false),
            )? {
                orchestrator.compressor().cache().clear()?;
                println!("Processed file records cleared");
            }
        }
    }

    Ok(())
}

/// Resume monitoring if it was left on, then stay up until Enter or EOF.
fn run_lifecycle(orchestrator: &Orchestrator) -> Result<()> {
    let config = orchestrator.config();
    match orchestrator.resume() {
        Ok(Some(WatchStart::Started | WatchStart::AlreadyWatching)) => {}
        Ok(None) => {
            if config.auto_monitoring {
                info!("Auto-monitoring is on but no folder is set; use `set-folder`");
            } else {
                info!("Auto-monitoring is off; use `auto-monitor on` or `watch`");
            }
        }
        Err(err) => error!("Could not resume monitoring: {}", err),
    }

    print_status(config.quality, config.default_folder().as_deref());
    wait_for_enter("Press Enter to exit.")?;
    orchestrator.shutdown();
    Ok(())
}

fn print_status(quality: QualityProfile, folder: Option<&Path>) {
    println!(
        "Default quality: {}, folder: {}",
        quality.to_string().green(),
        folder
            .map(|f| f.display().to_string())
            .unwrap_or_else(|| "(none)".to_string())
            .green()
    );
}

fn wait_for_enter(prompt: &str) -> io::Result<()> {
    println!("{}", prompt);
    io::stdout().flush()?;
    // EOF counts as Enter so the process can run with stdin closed.
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(())
}

fn prompt_confirm(prompt: &str, default: Option<bool>) -> io::Result<bool> {
    let mut input = String::new();

    loop {
        input.clear();

        match default {
            Some(true) => print!("{} (Y/n): ", prompt),
            Some(false) | None => print!("{} (y/N): ", prompt),
        }
        io::stdout().flush()?;

        if io::stdin().read_line(&mut input)? == 0 {
            return Ok(default.unwrap_or(false));
        }

        match input.trim().to_uppercase().as_str() {
            "Y" => return Ok(true),
            "N" => return Ok(false),
            "" => match default {
                Some(default) => return Ok(default),
                None => continue,
            },
            _ => continue,
        }
    }
}

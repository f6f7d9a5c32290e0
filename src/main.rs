use anyhow::{Context, Result};
use clap::Parser;
use log::debug;
use std::fs::OpenOptions;

use account_book::cli::{Cli, CliHandler};
use account_book::config::Settings;
use account_book::{tui, EntryStore};

fn initialize_logger(cli: &Cli, settings: &Settings) -> Result<()> {
    let filter = if cli.debug {
        simplelog::LevelFilter::Debug
    } else {
        simplelog::LevelFilter::Warn
    };

    if let Some(path) = &settings.log_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?;
        simplelog::WriteLogger::init(
            filter.max(simplelog::LevelFilter::Info),
            simplelog::Config::default(),
            file,
        )?;
    } else if cli.command.is_some() {
        // The table view owns the terminal, so it only logs to a file.
        simplelog::TermLogger::init(
            filter,
            simplelog::Config::default(),
            simplelog::TerminalMode::Stderr,
            simplelog::ColorChoice::Auto,
        )?;
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::from_args(cli.file.clone(), cli.log_file.clone())?;
    initialize_logger(&cli, &settings)?;
    debug!("data file: {}", settings.data_file.display());

    match cli.command {
        Some(command) => CliHandler::run(&settings.data_file, command),
        None => {
            let store = EntryStore::open(&settings.data_file)?;
            tui::run(store)
        }
    }
}

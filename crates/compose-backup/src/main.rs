//! # compose-backup
//! Backs up every labelled container of every service once, then exits.
//!

use std::{
    fs,
    path::{Path, PathBuf},
    process::ExitCode,
};

use clap::{Parser, Subcommand};
use compose_backup::{Config, LoadConfigError, run_backup};
use mimalloc::MiMalloc;
use shared::init_logger;
use tracing::{error, info};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

const DEFAULT_CONFIG: &str = "./config.toml";

#[derive(Parser)]
#[command(name = "compose-backup", version, about, long_about = None)]
struct Cli {
    /// Path to the config file. Defaults are used when `./config.toml` does not exist.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Write the default config file and exit.
    Init,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize config if requested.
    if let Some(Command::Init) = cli.command {
        let path = cli.config.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));
        return match write_default_config(&path) {
            Ok(()) => ExitCode::SUCCESS,
            Err(error) => {
                eprintln!("Could not write config to {path:?}: {error}");
                ExitCode::FAILURE
            }
        };
    }

    // Load config, the logger depends on it.
    let config = match &cli.config {
        Some(path) => Config::load_toml(path.clone()),
        None => match Config::load_toml(PathBuf::from(DEFAULT_CONFIG)) {
            Err(LoadConfigError::NoFile(_)) => Ok(Config::default()),
            result => result,
        },
    };
    let logging = config
        .as_ref()
        .map(|config| config.logging.clone())
        .unwrap_or_default();

    let _logger = match init_logger(&logging.directory, logging.debug, logging.use_colors) {
        Ok(guards) => guards,
        Err(error) => {
            eprintln!("Could not initialize logger: {error}");
            return ExitCode::FAILURE;
        }
    };

    let config = match config {
        Ok(config) => config,
        Err(error) => {
            error!("Could not load config: {error}");
            return ExitCode::FAILURE;
        }
    };

    match run_backup(&config).await {
        Ok(report) => {
            info!("Backup finished with {} errors", report.errors.len());
            ExitCode::SUCCESS
        }
        Err(error) => {
            error!("{error}");
            ExitCode::FAILURE
        }
    }
}

fn write_default_config(path: &Path) -> Result<(), Box<dyn core::error::Error>> {
    let contents = toml::to_string_pretty(&Config::default())?;
    fs::write(path, contents)?;
    Ok(())
}

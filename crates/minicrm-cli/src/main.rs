//! `minicrm-db`: operator tool for the MiniCRM database.

use std::process::ExitCode;

use clap::Parser;
use minicrm_common_config::{ConfigLoader, Environment, MiniCrmConfig};
use minicrm_common_log::{LogConfig, LogFormat, LogLevel};
use tracing::error;

mod cli;
mod commands;

use cli::Cli;

/// Process exit codes
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    Success = 0,
    GeneralError = 1,
    ConfigError = 2,
    CheckFailed = 3,
}

impl From<Exit> for ExitCode {
    fn from(exit: Exit) -> Self {
        ExitCode::from(exit as u8)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = Environment::init() {
        eprintln!("warning: {e}");
    }

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e:#}");
            return Exit::ConfigError.into();
        }
    };

    if let Err(e) = minicrm_common_log::init(log_config(&cli, &config)) {
        eprintln!("warning: {e}");
    }

    match commands::run(&cli.command, &config, cli.quiet) {
        Ok(exit) => exit.into(),
        Err(e) => {
            error!("{e:#}");
            if !cli.quiet {
                eprintln!("error: {e:#}");
            }
            Exit::GeneralError.into()
        }
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<MiniCrmConfig> {
    let mut config = ConfigLoader::new(&cli.config_dir).load()?;
    if let Some(path) = &cli.database {
        config.database.db_path = path.clone();
    }
    Ok(config)
}

fn log_config(cli: &Cli, config: &MiniCrmConfig) -> LogConfig {
    let configured = LogLevel::parse(&config.logging.level).unwrap_or_default();
    let level = match cli.verbose {
        0 if cli.quiet => LogLevel::Error,
        0 => configured,
        1 => LogLevel::Debug,
        _ => LogLevel::Trace,
    };

    LogConfig {
        level,
        format: LogFormat::parse(&config.logging.format),
        file_path: config.logging.file.clone(),
        source_location: cli.verbose >= 2,
        ..LogConfig::default()
    }
}

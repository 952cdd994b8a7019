//! Loreforge
//!
//! Command-line entry point: loads `loreforge.toml`, sets up logging and
//! hands off to the selected subcommand.

use loreforge_cli::{Cli, Config, output};
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Exit code for configuration and usage failures
const EXIT_CONFIG: u8 = 2;

fn init_tracing(config: &Config) {
    // LOREFORGE_LOG, then RUST_LOG, then the configured level
    let filter = EnvFilter::try_from_env("LOREFORGE_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::from_env();

    let config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(err) => {
            output::error(&err);
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    init_tracing(&config);
    tracing::debug!(config = %cli.config.display(), "configuration loaded");

    match loreforge_cli::run(cli, &config) {
        Ok(code) => code,
        Err(err) => {
            output::error(&err);
            ExitCode::FAILURE
        }
    }
}

//! Scribe CLI Binary
//!
//! Command-line interface for staged document generation.

use anyhow::Context;
use clap::Parser;
use scribe::cli::{Cli, RunContext};
use scribe::config::ConfigLoader;
use scribe::logging::{init_logging, LoggingConfig};
use std::process;
use tracing::{error, info};

fn main() {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("{:#}", e);
            process::exit(1);
        }
    }
}

/// Runs one command. Returns the process exit code; setup problems are errors.
fn run(cli: Cli) -> anyhow::Result<i32> {
    // Build logging config from CLI args, env vars, and config file
    let logging_config = build_logging_config(&cli);
    init_logging(Some(&logging_config)).context("Failed to initialize logging")?;

    info!("Scribe CLI starting");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    let context = match RunContext::new(cli.workspace.clone(), cli.config.clone()) {
        Ok(ctx) => {
            info!("CLI context initialized");
            ctx
        }
        Err(e) => {
            error!("Error loading configuration: {}", e);
            eprintln!("{}", scribe::cli::map_error(&e));
            return Ok(1);
        }
    };

    match runtime.block_on(context.execute(&cli.command)) {
        Ok(output) => {
            info!("Command completed successfully");
            println!("{}", output);
            Ok(0)
        }
        Err(e) => {
            error!("Command failed: {}", e);
            eprintln!("{}", scribe::cli::map_error(&e));
            Ok(1)
        }
    }
}

/// Build logging configuration from CLI args, environment, and config file.
/// Precedence: CLI flags override config file override defaults.
fn build_logging_config(cli: &Cli) -> LoggingConfig {
    let mut config = ConfigLoader::load_with_override(&cli.workspace, cli.config.as_deref())
        .ok()
        .map(|c| c.logging)
        .unwrap_or_default();

    if cli.quiet {
        config.enabled = false;
    }
    if cli.verbose {
        config.level = "debug".to_string();
    }
    if let Some(ref level) = cli.log_level {
        config.level = level.clone();
    }
    if let Some(ref format) = cli.log_format {
        config.format = format.clone();
    }
    if let Some(ref output) = cli.log_output {
        config.output = output.clone();
    }
    if let Some(ref file) = cli.log_file {
        config.file = file.clone();
    }
    if config.file.is_relative() {
        config.file = cli.workspace.join(&config.file);
    }

    config
}

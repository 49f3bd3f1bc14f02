//! Slipway CLI - a build-matrix runner for plugin release pipelines

use anyhow::Result;
use clap::Parser;
use slipway::util::errors::ConfigError;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("error: {:#}", e);
            // Catalog problems are distinguishable from build failures.
            let code = if e.downcast_ref::<ConfigError>().is_some() {
                2
            } else {
                1
            };
            std::process::exit(code);
        }
    }
}

fn run() -> Result<i32> {
    // Parse CLI
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("slipway=debug")
    } else {
        EnvFilter::new("slipway=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();

    // Execute command
    match cli.command {
        Commands::Run(args) => commands::run::execute(args, cli.verbose),
        Commands::Targets(args) => commands::targets::execute(args).map(|_| 0),
        Commands::Check(args) => commands::check::execute(args).map(|_| 0),
        Commands::Completions(args) => commands::completions::execute(args).map(|_| 0),
    }
}

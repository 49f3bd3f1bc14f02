//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

/// Slipway - a build-matrix runner for plugin release pipelines
#[derive(Parser)]
#[command(name = "slipway")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the build matrix
    Run(RunArgs),

    /// List the targets declared in the catalog
    Targets(TargetsArgs),

    /// Validate the catalog and the local tooling
    Check(CheckArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args)]
pub struct RunArgs {
    /// Path to the matrix catalog
    #[arg(long, default_value = "matrix.toml")]
    pub matrix: PathBuf,

    /// Event that started the run: pull-request, push, or tag
    #[arg(long, default_value = "push")]
    pub trigger: String,

    /// Branch or tag name being built
    #[arg(long = "ref", env = "SLIPWAY_REF")]
    pub git_ref: Option<String>,

    /// Commit reference being built
    #[arg(long, env = "SLIPWAY_COMMIT")]
    pub commit: Option<String>,

    /// Number of parallel workers
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Run only these target labels
    #[arg(long)]
    pub only: Vec<String>,

    /// Walk the pipelines without building or uploading
    #[arg(long)]
    pub dry_run: bool,

    /// Write the JSON run report to this path
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Output root (defaults to slipway-out next to the catalog)
    #[arg(long)]
    pub out_dir: Option<PathBuf>,
}

#[derive(Args)]
pub struct TargetsArgs {
    /// Path to the matrix catalog
    #[arg(long, default_value = "matrix.toml")]
    pub matrix: PathBuf,
}

#[derive(Args)]
pub struct CheckArgs {
    /// Path to the matrix catalog
    #[arg(long, default_value = "matrix.toml")]
    pub matrix: PathBuf,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: Shell,
}

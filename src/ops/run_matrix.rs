//! The full matrix run: load the catalog, gate on formatting, fan out the
//! per-target pipelines, and emit the machine-readable report.

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::core::catalog::Catalog;
use crate::core::run::{BuildJob, RunContext, Trigger};
use crate::pipeline::build::fmt_gate;
use crate::pipeline::coordinator::{CancelToken, Coordinator, MatrixReport};
use crate::pipeline::provision::Provisioner;
use crate::pipeline::publish::Publisher;
use crate::util::fs::{ensure_dir, write_string};

/// Options for one `slipway run` invocation.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Path to the catalog file.
    pub matrix: PathBuf,

    /// What kind of event started this run.
    pub trigger: Trigger,

    /// Branch or tag name, when known.
    pub git_ref: Option<String>,

    /// Commit reference being built, when known.
    pub commit: Option<String>,

    /// Worker-pool size override.
    pub workers: Option<usize>,

    /// Labels to run; empty runs the whole catalog.
    pub only: Vec<String>,

    /// Walk the pipelines without side effects.
    pub dry_run: bool,

    /// Where to write the JSON run report.
    pub report: Option<PathBuf>,

    /// Output root; defaults to `slipway-out` next to the catalog.
    pub out_dir: Option<PathBuf>,

    /// Verbose per-stage logging instead of the progress bar.
    pub verbose: bool,
}

/// Run the matrix to completion and return the per-target report.
///
/// Catalog and selection problems surface as [`ConfigError`] before any
/// pipeline starts; after that point per-target failures are recorded in
/// the report rather than returned.
///
/// [`ConfigError`]: crate::util::errors::ConfigError
pub fn run_matrix(opts: &RunOptions, cancel: CancelToken) -> Result<MatrixReport> {
    let catalog = Catalog::load(&opts.matrix)?;
    let selected = catalog.select(&opts.only)?;

    let context = RunContext {
        trigger: opts.trigger,
        git_ref: opts.git_ref.clone(),
        commit: opts.commit.clone(),
        dry_run: opts.dry_run,
    };

    tracing::info!(
        "running {} of {} target(s), trigger `{}`{}",
        selected.len(),
        catalog.targets().len(),
        context.trigger,
        if context.dry_run { " (dry run)" } else { "" }
    );

    // The format gate runs once per invocation, before any target builds.
    fmt_gate(&catalog.build, opts.dry_run)?;

    let out_root = match &opts.out_dir {
        Some(dir) => dir.clone(),
        None => opts
            .matrix
            .parent()
            .unwrap_or_else(|| std::path::Path::new("."))
            .join("slipway-out"),
    };
    if !opts.dry_run {
        ensure_dir(&out_root)?;
    }

    let provisioner = Provisioner::new(
        catalog.toolchain.clone(),
        toolchain_cache_dir(&out_root),
        opts.dry_run,
    );
    let publisher = Publisher::new(catalog.release.clone(), opts.dry_run);

    let jobs = BuildJob::for_targets(selected, &context);
    let report = Coordinator::new(&catalog, &provisioner, &publisher, &out_root)
        .workers(opts.workers)
        .verbose(opts.verbose)
        .cancel_token(cancel)
        .run(&jobs)?;

    if let Some(path) = &opts.report {
        let json = serde_json::to_string_pretty(&report)
            .context("failed to serialize run report")?;
        write_string(path, &json)?;
        tracing::info!("wrote run report to {}", path.display());
    }

    Ok(report)
}

/// Where cross toolsets are cached between runs.
///
/// The user-level cache directory when the platform provides one, falling
/// back to a cache under the run's output root.
fn toolchain_cache_dir(out_root: &std::path::Path) -> PathBuf {
    directories::ProjectDirs::from("", "", "slipway")
        .map(|dirs| dirs.cache_dir().to_path_buf())
        .unwrap_or_else(|| out_root.join("cache"))
}

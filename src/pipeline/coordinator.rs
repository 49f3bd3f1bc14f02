//! Matrix coordination.
//!
//! Drives every catalog target through its own
//! Provision -> Build -> Package -> Publish pipeline on a bounded worker
//! pool. Stages order strictly within one target; nothing orders across
//! targets. There is no fail-fast: a failed target is recorded and the rest
//! run to completion, which is exactly the "continue on a matrix entry's
//! failure but still report an error" behavior.

use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::Serialize;

use crate::core::catalog::Catalog;
use crate::core::run::BuildJob;
use crate::pipeline::build::BuildExecutor;
use crate::pipeline::package::{Packager, ReleaseAsset};
use crate::pipeline::provision::Provisioner;
use crate::pipeline::publish::Publisher;
use crate::util::errors::BuildError;
use crate::util::fs::remove_dir_all_if_exists;

/// Where one target's pipeline ended up.
///
/// `Done`, `Failed`, and `Cancelled` are terminal; the others are the stages
/// a live pipeline moves through, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetState {
    Pending,
    Provisioning,
    Building,
    Packaging,
    Publishing,
    Done,
    Failed,
    Cancelled,
}

impl fmt::Display for TargetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TargetState::Pending => "pending",
            TargetState::Provisioning => "provisioning",
            TargetState::Building => "building",
            TargetState::Packaging => "packaging",
            TargetState::Publishing => "publishing",
            TargetState::Done => "done",
            TargetState::Failed => "failed",
            TargetState::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Final record for one target.
#[derive(Debug, Clone, Serialize)]
pub struct TargetReport {
    pub label: String,
    pub state: TargetState,
    pub error: Option<String>,
    pub asset: Option<ReleaseAsset>,
}

impl TargetReport {
    fn failed(label: &str, error: impl fmt::Display) -> Self {
        TargetReport {
            label: label.to_string(),
            state: TargetState::Failed,
            error: Some(error.to_string()),
            asset: None,
        }
    }

    fn cancelled(label: &str) -> Self {
        TargetReport {
            label: label.to_string(),
            state: TargetState::Cancelled,
            error: None,
            asset: None,
        }
    }
}

/// Everything that happened in one run, for the summary table and the
/// JSON report consumed by the invoking automation.
#[derive(Debug, Serialize)]
pub struct MatrixReport {
    pub targets: Vec<TargetReport>,
}

impl MatrixReport {
    /// Process exit code: 0 only if every target reached `Done`.
    pub fn exit_code(&self) -> i32 {
        if self
            .targets
            .iter()
            .all(|t| t.state == TargetState::Done)
        {
            0
        } else {
            1
        }
    }

    /// Render the per-target summary table.
    pub fn render_summary(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("{:<28} {:<12} {}\n", "target", "state", "detail"));

        for t in &self.targets {
            let detail = t
                .error
                .as_deref()
                .map(|e| e.lines().next().unwrap_or(e))
                .or(t.asset.as_ref().map(|a| a.file_name.as_str()))
                .unwrap_or("");
            out.push_str(&format!("{:<28} {:<12} {}\n", t.label, t.state, detail));
        }

        let done = self.count(TargetState::Done);
        let failed = self.count(TargetState::Failed);
        let cancelled = self.count(TargetState::Cancelled);
        out.push_str(&format!(
            "\n{} done, {} failed, {} cancelled\n",
            done, failed, cancelled
        ));
        out
    }

    fn count(&self, state: TargetState) -> usize {
        self.targets.iter().filter(|t| t.state == state).count()
    }
}

/// Run-level cancellation signal.
///
/// Checked at each suspension point (before provisioning, building, and
/// publishing); a cancelled worker discards its partial outputs.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        CancelToken::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Drives the per-target pipelines across a worker pool.
pub struct Coordinator<'a> {
    catalog: &'a Catalog,
    provisioner: &'a Provisioner,
    publisher: &'a Publisher,
    out_root: &'a Path,
    workers: Option<usize>,
    verbose: bool,
    cancel: CancelToken,
}

impl<'a> Coordinator<'a> {
    pub fn new(
        catalog: &'a Catalog,
        provisioner: &'a Provisioner,
        publisher: &'a Publisher,
        out_root: &'a Path,
    ) -> Self {
        Coordinator {
            catalog,
            provisioner,
            publisher,
            out_root,
            workers: None,
            verbose: false,
            cancel: CancelToken::new(),
        }
    }

    /// Override the worker-pool size.
    pub fn workers(mut self, workers: Option<usize>) -> Self {
        self.workers = workers;
        self
    }

    /// Enable verbose output (disables the progress bar).
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Install an external cancellation token.
    pub fn cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run every job to a terminal state and collect the report.
    ///
    /// Exactly one worker pipeline per job; the pool is bounded by the
    /// requested size, the host's `max_jobs` cap, and available CPU cores,
    /// whichever is smallest.
    pub fn run(&self, jobs: &[BuildJob]) -> Result<MatrixReport> {
        let workers = self.worker_count(jobs.len());
        tracing::debug!("running {} target(s) on {} worker(s)", jobs.len(), workers);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .context("failed to build worker pool")?;

        let pb = if !self.verbose && jobs.len() > 1 {
            let pb = ProgressBar::new(jobs.len() as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                    .unwrap()
                    .progress_chars("#>-"),
            );
            Some(pb)
        } else {
            None
        };

        let targets = pool.install(|| {
            jobs.par_iter()
                .map(|job| {
                    let report = self.run_pipeline(job);
                    if let Some(pb) = &pb {
                        pb.set_message(report.label.clone());
                        pb.inc(1);
                    }
                    report
                })
                .collect::<Vec<_>>()
        });

        if let Some(pb) = pb {
            pb.finish_and_clear();
        }

        Ok(MatrixReport { targets })
    }

    fn worker_count(&self, jobs: usize) -> usize {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let mut workers = self.workers.unwrap_or(cores);
        if let Some(cap) = self.catalog.build.max_jobs {
            workers = workers.min(cap);
        }
        workers.clamp(1, jobs.max(1))
    }

    /// One target's full pipeline. Every error is converted to a terminal
    /// state here, at the worker boundary; nothing escapes to abort the
    /// matrix.
    fn run_pipeline(&self, job: &BuildJob) -> TargetReport {
        let target = &job.target;
        let label = &target.label;
        let dry_run = job.context.dry_run;

        // Provision
        if self.cancelled(label) {
            return TargetReport::cancelled(label);
        }
        tracing::info!("[{}] provisioning", label);
        if let Err(e) = self.provisioner.ensure(target) {
            return TargetReport::failed(label, e);
        }

        // Build
        if self.cancelled(label) {
            return TargetReport::cancelled(label);
        }
        tracing::info!("[{}] building", label);
        let executor = BuildExecutor::new(&self.catalog.build, self.out_root, dry_run);
        let result = executor.build(job);
        if !result.is_success() {
            let error = BuildError {
                label: label.clone(),
                code: result.code,
                stderr: result.detail.clone().unwrap_or_default(),
            };
            return TargetReport::failed(label, error);
        }

        // Package
        tracing::info!("[{}] packaging", label);
        let packager = Packager::new(self.out_root.join("dist"), dry_run);
        let asset = match packager.package(target, &result) {
            Ok(asset) => asset,
            Err(e) => return TargetReport::failed(label, e),
        };

        // Publish, only for tag triggers and non-exempt targets
        if job.context.is_release() && !target.release_exempt {
            if self.cancelled(label) {
                return TargetReport::cancelled(label);
            }
            if let Some(asset) = &asset {
                tracing::info!("[{}] publishing", label);
                match self.publisher.publish(std::slice::from_ref(asset), &job.context) {
                    Err(auth) => return TargetReport::failed(label, auth),
                    Ok(outcome) if !outcome.is_clean() => {
                        let detail: Vec<String> =
                            outcome.failed.iter().map(|e| e.to_string()).collect();
                        return TargetReport::failed(label, detail.join("; "));
                    }
                    Ok(_) => {}
                }
            }
        }

        TargetReport {
            label: label.clone(),
            state: TargetState::Done,
            error: None,
            asset,
        }
    }

    /// Check the cancellation token; on cancel, discard this target's
    /// partial output directory so a later run starts clean.
    fn cancelled(&self, label: &str) -> bool {
        if !self.cancel.is_cancelled() {
            return false;
        }
        tracing::info!("[{}] cancelled", label);
        let _ = remove_dir_all_if_exists(&self.out_root.join("targets").join(label));
        true
    }
}

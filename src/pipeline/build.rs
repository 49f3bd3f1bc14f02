//! Build execution for one target.
//!
//! The build tool itself is an opaque external command; the executor's job is
//! constructing its environment (`TARGET`, `FEATURES`, `RUSTFLAGS`,
//! `OS_NAME`), isolating its output per target, and turning a nonzero exit
//! into a recorded failure instead of a process-fatal error.

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};

use crate::core::catalog::{BuildConfig, FmtPolicy};
use crate::core::run::BuildJob;
use crate::util::fs::{ensure_dir, glob_files};
use crate::util::process::ProcessBuilder;

/// Final status of one target's build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildStatus {
    Success,
    Failure,
    Skipped,
}

/// Outcome of a build invocation, consumed by the packager.
#[derive(Debug, Clone)]
pub struct BuildResult {
    /// Label of the target that was built.
    pub label: String,

    /// Whether the build succeeded.
    pub status: BuildStatus,

    /// Exit code of the build tool, when it ran at all.
    pub code: Option<i32>,

    /// Discovered artifact paths, empty unless `status` is `Success`.
    pub artifacts: Vec<PathBuf>,

    /// Captured diagnostics on failure.
    pub detail: Option<String>,
}

impl BuildResult {
    pub fn is_success(&self) -> bool {
        self.status == BuildStatus::Success
    }

    fn failure(label: &str, detail: impl Into<String>) -> Self {
        BuildResult {
            label: label.to_string(),
            status: BuildStatus::Failure,
            code: None,
            artifacts: vec![],
            detail: Some(detail.into()),
        }
    }
}

/// Runs the external build command for targets.
pub struct BuildExecutor<'a> {
    config: &'a BuildConfig,
    out_root: &'a Path,
    dry_run: bool,
}

impl<'a> BuildExecutor<'a> {
    pub fn new(config: &'a BuildConfig, out_root: &'a Path, dry_run: bool) -> Self {
        BuildExecutor {
            config,
            out_root,
            dry_run,
        }
    }

    /// The output directory owned exclusively by one target's worker.
    pub fn out_dir(&self, label: &str) -> PathBuf {
        self.out_root.join("targets").join(label)
    }

    /// Build one target.
    ///
    /// Never returns an error: anything that goes wrong, from a missing
    /// build tool to a nonzero exit, becomes a `Failure` result so one
    /// target cannot abort the matrix.
    pub fn build(&self, job: &BuildJob) -> BuildResult {
        let target = &job.target;
        let out_dir = self.out_dir(&target.label);

        let mut cmd = ProcessBuilder::new(&self.config.command)
            .args(&self.config.args)
            .cwd(&out_dir)
            .env("TARGET", &target.triple)
            .env("FEATURES", target.features_env())
            .env("OS_NAME", target.os.as_str());

        if let Some(flags) = &target.rustflags {
            cmd = cmd.env("RUSTFLAGS", flags);
        }

        if self.dry_run {
            tracing::info!(
                "dry-run: would build `{}` with `{}` in {}",
                target.label,
                cmd.display_command(),
                out_dir.display()
            );
            // Synthetic artifact so downstream naming can still be previewed.
            return BuildResult {
                label: target.label.clone(),
                status: BuildStatus::Success,
                code: Some(0),
                artifacts: vec![out_dir.join(format!("artifact{}", target.os.dylib_ext()))],
                detail: None,
            };
        }

        if let Err(e) = ensure_dir(&out_dir) {
            return BuildResult::failure(&target.label, e.to_string());
        }

        tracing::info!("building `{}`: {}", target.label, cmd.display_command());

        let output = match cmd.exec() {
            Ok(output) => output,
            Err(e) => return BuildResult::failure(&target.label, e.to_string()),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            tracing::warn!(
                "build failed for `{}` (exit {:?})",
                target.label,
                output.status.code()
            );
            return BuildResult {
                label: target.label.clone(),
                status: BuildStatus::Failure,
                code: output.status.code(),
                artifacts: vec![],
                detail: Some(stderr),
            };
        }

        let pattern = self
            .config
            .artifact_glob
            .as_deref()
            .unwrap_or_else(|| target.os.default_artifact_glob());

        let artifacts = match glob_files(&out_dir, pattern) {
            Ok(files) => files,
            Err(e) => return BuildResult::failure(&target.label, e.to_string()),
        };

        if artifacts.is_empty() {
            return BuildResult::failure(
                &target.label,
                format!(
                    "build succeeded but produced no artifacts matching `{}` in {}",
                    pattern,
                    out_dir.display()
                ),
            );
        }

        BuildResult {
            label: target.label.clone(),
            status: BuildStatus::Success,
            code: output.status.code(),
            artifacts,
            detail: None,
        }
    }
}

/// Run the pre-build format gate once per run, honoring the configured
/// policy. `strict` aborts the run before any target builds; `lenient`
/// logs and continues.
pub fn fmt_gate(config: &BuildConfig, dry_run: bool) -> Result<()> {
    if config.fmt_check == FmtPolicy::Off {
        return Ok(());
    }

    let cmd = ProcessBuilder::new(&config.command).args(&config.fmt_args);

    if dry_run {
        tracing::info!("dry-run: would run format gate `{}`", cmd.display_command());
        return Ok(());
    }

    let output = cmd.exec()?;
    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    match config.fmt_check {
        FmtPolicy::Strict => bail!("format gate failed:\n{}", stderr),
        _ => {
            tracing::warn!("format gate failed (lenient policy, continuing): {}", stderr);
            Ok(())
        }
    }
}

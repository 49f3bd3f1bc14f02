//! `slipway run` command
//!
//! Runs the matrix to completion and prints the per-target summary. The exit
//! code distinguishes a clean run (0), one or more failed targets (1), and a
//! catalog problem that prevented the run from starting (2, via main).

use anyhow::Result;
use slipway::core::Trigger;
use slipway::ops::{run_matrix, RunOptions};
use slipway::pipeline::CancelToken;
use slipway::util::errors::ConfigError;

use crate::cli::RunArgs;

pub fn execute(args: RunArgs, verbose: bool) -> Result<i32> {
    let trigger: Trigger = args.trigger.parse().map_err(ConfigError::new)?;

    let options = RunOptions {
        matrix: args.matrix,
        trigger,
        git_ref: args.git_ref,
        commit: args.commit,
        workers: args.workers,
        only: args.only,
        dry_run: args.dry_run,
        report: args.report,
        out_dir: args.out_dir,
        verbose,
    };

    let cancel = CancelToken::new();
    let report = run_matrix(&options, cancel)?;

    print!("{}", report.render_summary());
    Ok(report.exit_code())
}

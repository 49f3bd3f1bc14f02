//! `slipway check` command
//!
//! Validates the catalog and reports whether the external tools a run would
//! invoke are actually on PATH, without building anything.

use anyhow::Result;
use slipway::core::Catalog;
use slipway::util::process::find_executable;

use crate::cli::CheckArgs;

pub fn execute(args: CheckArgs) -> Result<()> {
    let catalog = Catalog::load(&args.matrix)?;
    println!(
        "catalog ok: {} target(s) in {}",
        catalog.targets().len(),
        catalog.path.display()
    );

    report_tool("build command", &catalog.build.command);

    let needs_manager = catalog.targets().iter().any(|t| t.install_toolchain);
    if needs_manager {
        report_tool("toolchain manager", &catalog.toolchain.manager);
    }

    let needs_cross = catalog.targets().iter().any(|t| t.cross);
    if needs_cross && catalog.toolchain.cross_url.is_none() {
        println!("warning: cross targets declared but [toolchain] cross_url is not set");
    }

    Ok(())
}

fn report_tool(role: &str, name: &str) {
    match find_executable(name) {
        Some(path) => println!("{} `{}` found at {}", role, name, path.display()),
        None => println!("warning: {} `{}` not found on PATH", role, name),
    }
}

//! `slipway targets` command
//!
//! Lists the catalog's targets with the fields that shape their builds.

use anyhow::Result;
use slipway::core::Catalog;

use crate::cli::TargetsArgs;

pub fn execute(args: TargetsArgs) -> Result<()> {
    let catalog = Catalog::load(&args.matrix)?;

    println!(
        "{:<20} {:<28} {:<8} {:<6} {}",
        "label", "triple", "os", "bits", "notes"
    );

    for target in catalog.targets() {
        let mut notes = Vec::new();
        if target.rename.is_some() {
            notes.push("renamed");
        }
        if target.cross {
            notes.push("cross");
        }
        if target.install_toolchain {
            notes.push("toolchain");
        }
        if target.release_exempt {
            notes.push("exempt");
        }

        println!(
            "{:<20} {:<28} {:<8} {:<6} {}",
            target.label,
            target.triple,
            target.os.as_str(),
            target.word_size.suffix(),
            notes.join(", ")
        );
    }

    Ok(())
}

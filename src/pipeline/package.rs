//! Artifact packaging.
//!
//! Turns a successful build into a [`ReleaseAsset`] under the target's
//! naming convention: the rename triple (when declared) replaces the raw
//! triple so user-facing annotations like a microarchitecture suffix
//! survive, and the word size is always embedded for disambiguation.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::core::target::TargetSpec;
use crate::pipeline::build::BuildResult;
use crate::util::fs::ensure_dir;
use crate::util::hash::sha256_file;

/// A packaged build output ready for release upload.
#[derive(Debug, Clone, Serialize)]
pub struct ReleaseAsset {
    /// Staged file path.
    pub path: PathBuf,

    /// Final, rename-aware file name.
    pub file_name: String,

    /// SHA-256 of the staged file; absent in dry runs.
    pub checksum: Option<String>,

    /// Carried from the target so the publisher can honor exemptions.
    pub release_exempt: bool,
}

/// Stages packaged assets into a shared distribution directory.
pub struct Packager {
    staging: PathBuf,
    dry_run: bool,
}

impl Packager {
    pub fn new(staging: PathBuf, dry_run: bool) -> Self {
        Packager { staging, dry_run }
    }

    /// Package the primary artifact of a successful build.
    ///
    /// Returns `Ok(None)` without touching the filesystem when the build
    /// did not succeed; failed targets never produce assets.
    pub fn package(
        &self,
        target: &TargetSpec,
        result: &BuildResult,
    ) -> Result<Option<ReleaseAsset>> {
        if !result.is_success() {
            tracing::debug!("skipping packaging for `{}` (not successful)", target.label);
            return Ok(None);
        }

        let artifact = match result.artifacts.first() {
            Some(path) => path,
            None => return Ok(None),
        };

        if result.artifacts.len() > 1 {
            tracing::warn!(
                "target `{}` produced {} artifacts; packaging only {}",
                target.label,
                result.artifacts.len(),
                artifact.display()
            );
        }

        let file_name = asset_file_name(target, artifact);
        let staged = self.staging.join(&file_name);

        if self.dry_run {
            tracing::info!("dry-run: would stage {} as {}", artifact.display(), file_name);
            return Ok(Some(ReleaseAsset {
                path: staged,
                file_name,
                checksum: None,
                release_exempt: target.release_exempt,
            }));
        }

        ensure_dir(&self.staging)?;
        std::fs::copy(artifact, &staged).with_context(|| {
            format!(
                "failed to stage {} as {}",
                artifact.display(),
                staged.display()
            )
        })?;

        let checksum = sha256_file(&staged)?;
        tracing::info!("staged {} ({})", file_name, &checksum[..16]);

        Ok(Some(ReleaseAsset {
            path: staged,
            file_name,
            checksum: Some(checksum),
            release_exempt: target.release_exempt,
        }))
    }
}

/// Compose the packaged file name for one artifact.
///
/// `<stem>-<rename-or-triple>-<bits>bit<ext>`; the rename replaces the raw
/// triple entirely, and the word size defaults to 64-bit upstream.
pub fn asset_file_name(target: &TargetSpec, artifact: &std::path::Path) -> String {
    let stem = artifact
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "artifact".to_string());

    let ext = artifact
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    format!(
        "{}-{}-{}{}",
        stem,
        target.effective_triple(),
        target.word_size.suffix(),
        ext
    )
}

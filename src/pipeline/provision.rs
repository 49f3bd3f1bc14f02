//! Toolchain provisioning.
//!
//! Ensures the compiler environment a target needs exists before its build
//! runs: fetching and extracting a cross-compilation toolset for `cross`
//! targets, and registering the triple with the local toolchain manager for
//! `install_toolchain` targets. Results are cached per target label, so a
//! second `ensure` within one run is a no-op.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use flate2::read::GzDecoder;
use tar::Archive;

use crate::core::catalog::ToolchainConfig;
use crate::core::target::TargetSpec;
use crate::util::errors::ProvisionError;
use crate::util::fs::{dir_has_files, ensure_dir, remove_dir_all_if_exists};
use crate::util::hash::sha256_bytes;
use crate::util::process::ProcessBuilder;

/// Proof that a target's toolchain is ready.
#[derive(Debug, Clone)]
pub struct ToolchainHandle {
    /// Label of the provisioned target.
    pub label: String,

    /// Root of the extracted cross toolset, for `cross` targets.
    pub toolset_root: Option<PathBuf>,
}

/// Provisions and caches toolchains for the duration of one run.
///
/// The on-disk cache directory is injected rather than ambient, keyed by
/// triple under `<cache>/cross/`; the in-process handle map is keyed by
/// target label.
pub struct Provisioner {
    config: ToolchainConfig,
    cache_dir: PathBuf,
    dry_run: bool,
    installed: Mutex<HashMap<String, ToolchainHandle>>,
}

impl Provisioner {
    /// Create a provisioner backed by the given cache directory.
    pub fn new(config: ToolchainConfig, cache_dir: PathBuf, dry_run: bool) -> Self {
        Provisioner {
            config,
            cache_dir,
            dry_run,
            installed: Mutex::new(HashMap::new()),
        }
    }

    /// Ensure the toolchain for `target` exists.
    ///
    /// Idempotent: the external install steps run at most once per target
    /// label per process.
    pub fn ensure(&self, target: &TargetSpec) -> Result<ToolchainHandle, ProvisionError> {
        if let Some(handle) = self.installed.lock().unwrap().get(&target.label) {
            tracing::debug!("toolchain for `{}` already provisioned", target.label);
            return Ok(handle.clone());
        }

        let toolset_root = if target.cross {
            Some(self.install_cross(target)?)
        } else {
            None
        };

        if target.install_toolchain {
            self.register_triple(&target.triple)?;
        }

        let handle = ToolchainHandle {
            label: target.label.clone(),
            toolset_root,
        };
        self.installed
            .lock()
            .unwrap()
            .insert(target.label.clone(), handle.clone());
        Ok(handle)
    }

    /// Fetch and extract the cross toolset for a target, with retries.
    fn install_cross(&self, target: &TargetSpec) -> Result<PathBuf, ProvisionError> {
        let dest = self.cache_dir.join("cross").join(&target.triple);

        if dir_has_files(&dest) {
            tracing::debug!("using cached cross toolset at {}", dest.display());
            return Ok(dest);
        }

        let template =
            self.config
                .cross_url
                .as_deref()
                .ok_or_else(|| ProvisionError::MissingCrossUrl {
                    label: target.label.clone(),
                })?;
        let url = template.replace("{triple}", &target.triple);

        if self.dry_run {
            tracing::info!("dry-run: would fetch cross toolset from {}", url);
            return Ok(dest);
        }

        retrying(self.config.retries, self.config.backoff_ms, || {
            self.fetch_and_extract(&url, target, &dest)
        })
    }

    /// One download-verify-extract attempt. Partial output is discarded
    /// on failure so a later attempt starts clean.
    fn fetch_and_extract(
        &self,
        url: &str,
        target: &TargetSpec,
        dest: &Path,
    ) -> Result<PathBuf, ProvisionError> {
        tracing::info!("fetching cross toolset from {}", url);

        let result = (|| {
            let response =
                reqwest::blocking::get(url).map_err(|e| ProvisionError::Download {
                    url: url.to_string(),
                    detail: e.to_string(),
                })?;

            if !response.status().is_success() {
                return Err(ProvisionError::Download {
                    url: url.to_string(),
                    detail: format!("HTTP {}", response.status()),
                });
            }

            let bytes = response.bytes().map_err(|e| ProvisionError::Download {
                url: url.to_string(),
                detail: e.to_string(),
            })?;

            if let Some(expected) = &target.cross_sha256 {
                let actual = sha256_bytes(&bytes);
                if &actual != expected {
                    return Err(ProvisionError::Checksum {
                        url: url.to_string(),
                        expected: expected.clone(),
                        actual,
                    });
                }
            }

            extract_toolset(&bytes, dest).map_err(|e| ProvisionError::Extract {
                triple: target.triple.clone(),
                detail: e.to_string(),
            })?;

            Ok(dest.to_path_buf())
        })();

        if result.is_err() {
            let _ = remove_dir_all_if_exists(dest);
        }
        result
    }

    /// Register a triple with the local toolchain manager.
    fn register_triple(&self, triple: &str) -> Result<(), ProvisionError> {
        let cmd = ProcessBuilder::new(&self.config.manager)
            .args(&self.config.manager_args)
            .arg(triple);

        if self.dry_run {
            tracing::info!("dry-run: would run `{}`", cmd.display_command());
            return Ok(());
        }

        tracing::info!("registering target: {}", cmd.display_command());

        let output = cmd.exec().map_err(|e| ProvisionError::Manager {
            triple: triple.to_string(),
            detail: e.to_string(),
        })?;

        if !output.status.success() {
            return Err(ProvisionError::Manager {
                triple: triple.to_string(),
                detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(())
    }
}

/// Run `f` up to `retries + 1` times with exponential backoff between
/// attempts. Provisioning failures are usually transient (network,
/// truncated archive), unlike build failures which are never retried.
fn retrying<T>(
    retries: u32,
    backoff_ms: u64,
    mut f: impl FnMut() -> Result<T, ProvisionError>,
) -> Result<T, ProvisionError> {
    let mut attempt = 0;
    loop {
        match f() {
            Ok(value) => return Ok(value),
            Err(err) if attempt < retries => {
                let delay = backoff_delay(backoff_ms, attempt);
                tracing::warn!(
                    "provisioning attempt {} failed ({}); retrying in {}ms",
                    attempt + 1,
                    err,
                    delay
                );
                std::thread::sleep(Duration::from_millis(delay));
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Exponential backoff for one retry attempt, in milliseconds.
///
/// The doubling is capped at 1024x the base so a large configured retry
/// bound cannot overflow the delay.
fn backoff_delay(backoff_ms: u64, attempt: u32) -> u64 {
    backoff_ms.saturating_mul(1u64 << attempt.min(10))
}

/// Extract a gzip-compressed toolset tarball into `dest`.
fn extract_toolset(data: &[u8], dest: &Path) -> anyhow::Result<()> {
    ensure_dir(dest)?;
    let decoder = GzDecoder::new(std::io::Cursor::new(data));
    let mut archive = Archive::new(decoder);
    archive.unpack(dest)?;
    Ok(())
}

//! The error taxonomy for a matrix run.
//!
//! Only `ConfigError` is fatal to the whole run (and maps to exit code 2).
//! Everything else is scoped: `ProvisionError` and `BuildError` fail a single
//! target, `AuthError` fails the publish stage, and `UploadError` is reported
//! per asset.

use std::path::PathBuf;

use miette::Diagnostic as MietteDiagnostic;
use thiserror::Error;

/// A fatal catalog or configuration problem.
///
/// Raised before any build starts; the CLI translates it to exit code 2.
#[derive(Debug, Error, MietteDiagnostic)]
#[error("invalid build catalog: {message}")]
#[diagnostic(
    code(slipway::catalog::invalid),
    help("Fix the catalog file and re-check it with `slipway check`")
)]
pub struct ConfigError {
    pub message: String,
    pub location: Option<PathBuf>,
}

impl ConfigError {
    /// Create a config error without a file location.
    pub fn new(message: impl Into<String>) -> Self {
        ConfigError {
            message: message.into(),
            location: None,
        }
    }

    /// Attach the catalog file the error came from.
    pub fn with_location(mut self, path: impl Into<PathBuf>) -> Self {
        self.location = Some(path.into());
        self
    }
}

/// A per-target toolchain provisioning failure, surfaced after retries.
#[derive(Debug, Error, MietteDiagnostic)]
pub enum ProvisionError {
    #[error("failed to download cross toolset from {url}: {detail}")]
    #[diagnostic(
        code(slipway::provision::download),
        help("Check network connectivity and the [toolchain] cross_url template")
    )]
    Download { url: String, detail: String },

    #[error("cross toolset checksum mismatch for {url}: expected {expected}, got {actual}")]
    #[diagnostic(code(slipway::provision::checksum))]
    Checksum {
        url: String,
        expected: String,
        actual: String,
    },

    #[error("failed to extract cross toolset for `{triple}`: {detail}")]
    #[diagnostic(code(slipway::provision::extract))]
    Extract { triple: String, detail: String },

    #[error("toolchain manager failed to register `{triple}`: {detail}")]
    #[diagnostic(
        code(slipway::provision::manager),
        help("Verify the [toolchain] manager command is installed and on PATH")
    )]
    Manager { triple: String, detail: String },

    #[error("no cross toolset URL configured but target `{label}` requires cross tooling")]
    #[diagnostic(
        code(slipway::provision::no_cross_url),
        help("Set [toolchain] cross_url in the catalog")
    )]
    MissingCrossUrl { label: String },
}

/// A failed build for one target.
///
/// Build failures are expected outcomes, never retried, and never abort the
/// matrix; this type is the diagnostic record attached to the failed target.
#[derive(Debug, Error, MietteDiagnostic)]
#[error("build failed for target `{label}` (exit code {code:?})")]
#[diagnostic(code(slipway::build::failed))]
pub struct BuildError {
    pub label: String,
    pub code: Option<i32>,
    pub stderr: String,
}

/// Missing publish credentials.
#[derive(Debug, Error, MietteDiagnostic)]
#[error("release token not found in environment variable `{token_env}`")]
#[diagnostic(
    code(slipway::publish::auth),
    help("Export the token or set [release] token_env to the variable that holds it")
)]
pub struct AuthError {
    pub token_env: String,
}

/// A single asset that failed to upload.
///
/// Reported per asset; other assets in the same publish batch still upload.
#[derive(Debug, Error, MietteDiagnostic)]
#[error("failed to upload `{asset}`: {detail}")]
#[diagnostic(code(slipway::publish::upload))]
pub struct UploadError {
    pub asset: String,
    pub detail: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err =
            ConfigError::new("duplicate target label `linux-x86_64`").with_location("matrix.toml");
        assert_eq!(
            err.to_string(),
            "invalid build catalog: duplicate target label `linux-x86_64`"
        );
        assert_eq!(
            err.location.as_deref(),
            Some(std::path::Path::new("matrix.toml"))
        );
    }

    #[test]
    fn test_provision_error_display() {
        let err = ProvisionError::Manager {
            triple: "aarch64-unknown-linux-gnu".into(),
            detail: "exit code 1".into(),
        };
        assert!(err.to_string().contains("aarch64-unknown-linux-gnu"));
    }
}

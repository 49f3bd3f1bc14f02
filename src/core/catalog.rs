//! Matrix catalog parsing and validation.
//!
//! The catalog is a TOML file describing every build target plus the shared
//! build, toolchain, and release configuration. A `[defaults]` table supplies
//! base values; each `[[target]]` entry overrides them field by field
//! (entry-specific fields always win). The catalog is loaded once at process
//! start and immutable thereafter.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::core::target::{is_valid_triple, OsClass, TargetSpec, WordSize};
use crate::util::errors::ConfigError;

/// Policy for the pre-build format gate.
///
/// The upstream pipeline ran its format check with a swallowed exit status;
/// here the choice is an explicit, named flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FmtPolicy {
    /// Do not run the format check.
    Off,
    /// Run the check, log a warning on failure, continue.
    #[default]
    Lenient,
    /// Run the check, abort the run before any target builds on failure.
    Strict,
}

/// Shared build-command configuration from the `[build]` table.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// External build tool to invoke.
    pub command: String,

    /// Arguments passed to the build tool.
    pub args: Vec<String>,

    /// Glob for artifact discovery within a target's output directory.
    /// Defaults to the target OS's shared-library extension.
    pub artifact_glob: Option<String>,

    /// Format-gate policy.
    pub fmt_check: FmtPolicy,

    /// Arguments for the format gate, run with the build command.
    pub fmt_args: Vec<String>,

    /// Host-imposed cap on parallel workers.
    pub max_jobs: Option<usize>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        BuildConfig {
            command: "cargo".to_string(),
            args: vec!["build".to_string(), "--release".to_string()],
            artifact_glob: None,
            fmt_check: FmtPolicy::default(),
            fmt_args: vec!["fmt".to_string(), "--".to_string(), "--check".to_string()],
            max_jobs: None,
        }
    }
}

/// Toolchain provisioning configuration from the `[toolchain]` table.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolchainConfig {
    /// Local toolchain manager command (`rustup`-shaped).
    pub manager: String,

    /// Arguments for registering a triple; the triple is appended.
    pub manager_args: Vec<String>,

    /// URL template for cross toolset archives; `{triple}` is substituted.
    pub cross_url: Option<String>,

    /// Retry bound for toolset download/extraction failures.
    pub retries: u32,

    /// Base backoff in milliseconds, doubled per attempt.
    pub backoff_ms: u64,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        ToolchainConfig {
            manager: "rustup".to_string(),
            manager_args: vec!["target".to_string(), "add".to_string()],
            cross_url: None,
            retries: 2,
            backoff_ms: 500,
        }
    }
}

/// Release upload configuration from the `[release]` table.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReleaseConfig {
    /// Upload endpoint template; `{tag}` and `{name}` are substituted.
    pub upload_url: Option<String>,

    /// Environment variable holding the publish token.
    pub token_env: String,
}

impl Default for ReleaseConfig {
    fn default() -> Self {
        ReleaseConfig {
            upload_url: None,
            token_env: "SLIPWAY_TOKEN".to_string(),
        }
    }
}

/// Known feature vocabulary from the `[vocabulary]` table.
///
/// When the list is non-empty, every target feature must appear in it.
/// An empty list disables the check.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct Vocabulary {
    features: Vec<String>,
}

/// Base values from the `[defaults]` table.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct RawDefaults {
    os: Option<OsClass>,
    bits: Option<u16>,
    features: Option<Vec<String>>,
    rustflags: Option<String>,
    cross: Option<bool>,
    install_toolchain: Option<bool>,
    release_exempt: Option<bool>,
}

/// One `[[target]]` entry before merging with defaults.
#[derive(Debug, Clone, Deserialize)]
struct RawTarget {
    label: String,
    triple: String,
    #[serde(default)]
    rename: Option<String>,
    #[serde(default)]
    os: Option<OsClass>,
    #[serde(default)]
    bits: Option<u16>,
    #[serde(default)]
    features: Option<Vec<String>>,
    #[serde(default)]
    rustflags: Option<String>,
    #[serde(default)]
    cross: Option<bool>,
    #[serde(default)]
    cross_sha256: Option<String>,
    #[serde(default)]
    install_toolchain: Option<bool>,
    #[serde(default)]
    release_exempt: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct RawCatalog {
    defaults: RawDefaults,
    vocabulary: Vocabulary,
    build: BuildConfig,
    toolchain: ToolchainConfig,
    release: ReleaseConfig,
    #[serde(rename = "target")]
    targets: Vec<RawTarget>,
}

/// The loaded, validated build matrix.
#[derive(Debug, Clone)]
pub struct Catalog {
    /// Path the catalog was loaded from.
    pub path: PathBuf,

    /// Shared build configuration.
    pub build: BuildConfig,

    /// Toolchain provisioning configuration.
    pub toolchain: ToolchainConfig,

    /// Release upload configuration.
    pub release: ReleaseConfig,

    targets: Vec<TargetSpec>,
}

impl Catalog {
    /// Load and validate a catalog file.
    pub fn load(path: &Path) -> Result<Catalog, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::new(format!("failed to read {}: {}", path.display(), e))
                .with_location(path)
        })?;

        let raw: RawCatalog = toml::from_str(&contents)
            .map_err(|e| ConfigError::new(e.to_string()).with_location(path))?;

        if raw.targets.is_empty() {
            return Err(ConfigError::new("catalog declares no targets").with_location(path));
        }

        let mut targets = Vec::with_capacity(raw.targets.len());
        let mut seen = HashSet::new();

        for entry in &raw.targets {
            if !seen.insert(entry.label.clone()) {
                return Err(
                    ConfigError::new(format!("duplicate target label `{}`", entry.label))
                        .with_location(path),
                );
            }
            targets.push(merge_target(&raw.defaults, entry).map_err(|e| e.with_location(path))?);
        }

        validate_features(&raw.vocabulary, &targets).map_err(|e| e.with_location(path))?;

        Ok(Catalog {
            path: path.to_path_buf(),
            build: raw.build,
            toolchain: raw.toolchain,
            release: raw.release,
            targets,
        })
    }

    /// All targets, in catalog order.
    pub fn targets(&self) -> &[TargetSpec] {
        &self.targets
    }

    /// Select targets by label; an empty filter selects everything.
    ///
    /// Errors if a requested label does not exist, to prevent silent no-ops.
    pub fn select(&self, filter: &[String]) -> Result<Vec<&TargetSpec>, ConfigError> {
        if filter.is_empty() {
            return Ok(self.targets.iter().collect());
        }

        let mut selected = Vec::new();
        for label in filter {
            match self.targets.iter().find(|t| &t.label == label) {
                Some(t) => selected.push(t),
                None => {
                    let known: Vec<_> = self.targets.iter().map(|t| t.label.as_str()).collect();
                    return Err(ConfigError::new(format!(
                        "unknown target `{}`\navailable targets: {}",
                        label,
                        known.join(", ")
                    )));
                }
            }
        }
        Ok(selected)
    }
}

/// Merge one catalog entry over the `[defaults]` table.
///
/// Precedence: entry-specific fields override defaults; hard defaults
/// (linux, 64-bit, no features, no flags) apply when both are absent.
fn merge_target(defaults: &RawDefaults, entry: &RawTarget) -> Result<TargetSpec, ConfigError> {
    if entry.label.trim().is_empty() {
        return Err(ConfigError::new("target with empty label"));
    }

    if !is_valid_triple(&entry.triple) {
        return Err(ConfigError::new(format!(
            "malformed architecture triple `{}` for target `{}`",
            entry.triple, entry.label
        )));
    }

    if let Some(rename) = &entry.rename {
        if !is_valid_triple(rename) {
            return Err(ConfigError::new(format!(
                "malformed rename triple `{}` for target `{}`",
                rename, entry.label
            )));
        }
    }

    let bits = entry.bits.or(defaults.bits).unwrap_or(64);
    let word_size = WordSize::from_bits(bits).ok_or_else(|| {
        ConfigError::new(format!(
            "invalid word size {} for target `{}` (expected 32 or 64)",
            bits, entry.label
        ))
    })?;

    Ok(TargetSpec {
        label: entry.label.clone(),
        os: entry.os.or(defaults.os).unwrap_or(OsClass::Linux),
        triple: entry.triple.clone(),
        rename: entry.rename.clone(),
        rustflags: entry
            .rustflags
            .clone()
            .or_else(|| defaults.rustflags.clone()),
        features: entry
            .features
            .clone()
            .or_else(|| defaults.features.clone())
            .unwrap_or_default(),
        word_size,
        cross: entry.cross.or(defaults.cross).unwrap_or(false),
        cross_sha256: entry.cross_sha256.clone(),
        install_toolchain: entry
            .install_toolchain
            .or(defaults.install_toolchain)
            .unwrap_or(false),
        release_exempt: entry
            .release_exempt
            .or(defaults.release_exempt)
            .unwrap_or(false),
    })
}

fn validate_features(vocabulary: &Vocabulary, targets: &[TargetSpec]) -> Result<(), ConfigError> {
    if vocabulary.features.is_empty() {
        return Ok(());
    }

    let known: HashSet<&str> = vocabulary.features.iter().map(String::as_str).collect();
    for target in targets {
        for feature in &target.features {
            if !known.contains(feature.as_str()) {
                return Err(ConfigError::new(format!(
                    "unknown feature `{}` for target `{}` (vocabulary: {})",
                    feature,
                    target.label,
                    vocabulary.features.join(", ")
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_catalog(contents: &str) -> (TempDir, PathBuf) {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("matrix.toml");
        std::fs::write(&path, contents).unwrap();
        (tmp, path)
    }

    #[test]
    fn test_load_minimal_catalog() {
        let (_tmp, path) = write_catalog(
            r#"
[[target]]
label = "linux-x86_64"
triple = "x86_64-unknown-linux-gnu"
"#,
        );

        let catalog = Catalog::load(&path).unwrap();
        assert_eq!(catalog.targets().len(), 1);

        let t = &catalog.targets()[0];
        assert_eq!(t.os, OsClass::Linux);
        assert_eq!(t.word_size, WordSize::Bits64);
        assert!(!t.cross);
        assert!(!t.release_exempt);
        assert_eq!(catalog.build.command, "cargo");
        assert_eq!(catalog.release.token_env, "SLIPWAY_TOKEN");
    }

    #[test]
    fn test_defaults_merge_precedence() {
        let (_tmp, path) = write_catalog(
            r#"
[defaults]
os = "windows"
bits = 32
features = ["auto-splitting"]

[[target]]
label = "win32"
triple = "i686-pc-windows-msvc"

[[target]]
label = "win64"
triple = "x86_64-pc-windows-msvc"
bits = 64
features = []
"#,
        );

        let catalog = Catalog::load(&path).unwrap();
        let win32 = &catalog.targets()[0];
        let win64 = &catalog.targets()[1];

        // win32 inherits everything from defaults.
        assert_eq!(win32.os, OsClass::Windows);
        assert_eq!(win32.word_size, WordSize::Bits32);
        assert_eq!(win32.features, vec!["auto-splitting".to_string()]);

        // win64's own fields win over defaults.
        assert_eq!(win64.word_size, WordSize::Bits64);
        assert!(win64.features.is_empty());
        assert_eq!(win64.os, OsClass::Windows);
    }

    #[test]
    fn test_duplicate_labels_rejected() {
        let (_tmp, path) = write_catalog(
            r#"
[[target]]
label = "dup"
triple = "x86_64-unknown-linux-gnu"

[[target]]
label = "dup"
triple = "aarch64-unknown-linux-gnu"
"#,
        );

        let err = Catalog::load(&path).unwrap_err();
        assert!(err.to_string().contains("duplicate target label"));
    }

    #[test]
    fn test_malformed_triple_rejected() {
        let (_tmp, path) = write_catalog(
            r#"
[[target]]
label = "bad"
triple = "x86_64"
"#,
        );

        let err = Catalog::load(&path).unwrap_err();
        assert!(err.to_string().contains("malformed architecture triple"));
    }

    #[test]
    fn test_feature_vocabulary_enforced() {
        let (_tmp, path) = write_catalog(
            r#"
[vocabulary]
features = ["auto-splitting"]

[[target]]
label = "a"
triple = "x86_64-unknown-linux-gnu"
features = ["telemetry"]
"#,
        );

        let err = Catalog::load(&path).unwrap_err();
        assert!(err.to_string().contains("unknown feature `telemetry`"));
    }

    #[test]
    fn test_invalid_bits_rejected() {
        let (_tmp, path) = write_catalog(
            r#"
[[target]]
label = "odd"
triple = "x86_64-unknown-linux-gnu"
bits = 48
"#,
        );

        let err = Catalog::load(&path).unwrap_err();
        assert!(err.to_string().contains("invalid word size"));
    }

    #[test]
    fn test_empty_catalog_rejected() {
        let (_tmp, path) = write_catalog("");
        let err = Catalog::load(&path).unwrap_err();
        assert!(err.to_string().contains("no targets"));
    }

    #[test]
    fn test_select_unknown_label() {
        let (_tmp, path) = write_catalog(
            r#"
[[target]]
label = "a"
triple = "x86_64-unknown-linux-gnu"
"#,
        );

        let catalog = Catalog::load(&path).unwrap();
        assert_eq!(catalog.select(&[]).unwrap().len(), 1);

        let err = catalog.select(&["missing".to_string()]).unwrap_err();
        assert!(err.to_string().contains("unknown target `missing`"));
        assert!(err.to_string().contains("available targets: a"));
    }
}

//! Build target description.
//!
//! A [`TargetSpec`] is one platform+architecture+ABI combination the matrix
//! builds for. Specs are produced by the catalog loader and immutable
//! afterwards.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Operating system class of a build target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OsClass {
    Linux,
    Macos,
    Windows,
}

impl OsClass {
    /// Name passed to the build command via `OS_NAME`.
    pub fn as_str(&self) -> &'static str {
        match self {
            OsClass::Linux => "linux",
            OsClass::Macos => "macos",
            OsClass::Windows => "windows",
        }
    }

    /// Shared-library extension for this OS, with the leading dot.
    pub fn dylib_ext(&self) -> &'static str {
        match self {
            OsClass::Linux => ".so",
            OsClass::Macos => ".dylib",
            OsClass::Windows => ".dll",
        }
    }

    /// Default glob used to discover build artifacts.
    pub fn default_artifact_glob(&self) -> &'static str {
        match self {
            OsClass::Linux => "*.so",
            OsClass::Macos => "*.dylib",
            OsClass::Windows => "*.dll",
        }
    }
}

impl fmt::Display for OsClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pointer width of a build target.
///
/// Embedded in packaged asset names; unspecified targets default to 64-bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WordSize {
    #[serde(rename = "32bit")]
    Bits32,
    #[default]
    #[serde(rename = "64bit")]
    Bits64,
}

impl WordSize {
    /// Parse a `bits = 32 | 64` catalog value.
    pub fn from_bits(bits: u16) -> Option<Self> {
        match bits {
            32 => Some(WordSize::Bits32),
            64 => Some(WordSize::Bits64),
            _ => None,
        }
    }

    /// Suffix used in packaged asset names.
    pub fn suffix(&self) -> &'static str {
        match self {
            WordSize::Bits32 => "32bit",
            WordSize::Bits64 => "64bit",
        }
    }
}

/// A single entry of the build matrix.
#[derive(Debug, Clone, Serialize)]
pub struct TargetSpec {
    /// Unique label identifying this target within the catalog.
    pub label: String,

    /// Operating system class.
    pub os: OsClass,

    /// Architecture triple handed to the build command as `TARGET`.
    pub triple: String,

    /// Optional replacement triple used in packaged asset names.
    ///
    /// Carries user-facing annotations the raw triple lacks, such as a
    /// microarchitecture suffix (`x86_64_v3-unknown-linux-gnu`).
    pub rename: Option<String>,

    /// Extra compiler flags, handed to the build command as `RUSTFLAGS`.
    pub rustflags: Option<String>,

    /// Feature flags enabled for this target.
    pub features: Vec<String>,

    /// Pointer width, defaulting to 64-bit.
    pub word_size: WordSize,

    /// Whether a cross-compilation toolset must be fetched before building.
    pub cross: bool,

    /// Expected SHA-256 of the cross toolset archive, if pinned.
    pub cross_sha256: Option<String>,

    /// Whether the triple must be registered with the toolchain manager.
    pub install_toolchain: bool,

    /// Never publish this target's asset, regardless of trigger.
    pub release_exempt: bool,
}

impl TargetSpec {
    /// The triple used in packaged asset names: the rename when declared,
    /// otherwise the raw triple.
    pub fn effective_triple(&self) -> &str {
        self.rename.as_deref().unwrap_or(&self.triple)
    }

    /// Feature list in the form the build command expects (`FEATURES` env).
    pub fn features_env(&self) -> String {
        self.features.join(",")
    }
}

/// Check that an architecture triple is well-formed.
///
/// Accepts two to four dash-separated components of `[A-Za-z0-9_.]`,
/// which covers everything from `i686-pc-windows-msvc` to
/// `x86_64_v3-unknown-linux-gnu`.
pub fn is_valid_triple(triple: &str) -> bool {
    static TRIPLE_RE: OnceLock<Regex> = OnceLock::new();
    let re = TRIPLE_RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9_.]+(-[A-Za-z0-9_.]+){1,3}$").unwrap()
    });
    re.is_match(triple)
}

//! Core data model: the target catalog and run context.

pub mod catalog;
pub mod run;
pub mod target;

pub use catalog::{BuildConfig, Catalog, FmtPolicy, ReleaseConfig, ToolchainConfig};
pub use run::{BuildJob, RunContext, Trigger};
pub use target::{OsClass, TargetSpec, WordSize};

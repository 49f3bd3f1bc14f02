//! Slipway builds a plugin's release matrix: every target in a TOML catalog
//! gets its own provision, build, package, and publish pipeline, fanned out
//! across a bounded worker pool with no fail-fast between targets.
//!
//! The library is organized in three layers:
//!
//! - [`core`]: the catalog, target model, and run context
//! - [`pipeline`]: the four per-target stages and the coordinator
//! - [`ops`]: the whole-run operations the CLI invokes

pub mod core;
pub mod ops;
pub mod pipeline;
pub mod util;

pub use self::core::{Catalog, RunContext, TargetSpec, Trigger};
pub use self::pipeline::{CancelToken, MatrixReport, TargetReport, TargetState};

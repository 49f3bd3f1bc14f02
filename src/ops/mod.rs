//! High-level operations behind the CLI commands.

pub mod run_matrix;

pub use run_matrix::{run_matrix, RunOptions};

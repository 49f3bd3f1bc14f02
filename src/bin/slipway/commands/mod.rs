//! Command implementations

pub mod check;
pub mod completions;
pub mod run;
pub mod targets;

//! Shared utilities

pub mod errors;
pub mod fs;
pub mod hash;
pub mod process;

pub use errors::{AuthError, BuildError, ConfigError, ProvisionError, UploadError};

//! The per-target pipeline stages and the coordinator that drives them.
//!
//! Each target walks Provision -> Build -> Package -> Publish inside its own
//! worker; the coordinator fans the workers out and collects per-target
//! reports without fail-fast.

pub mod build;
pub mod coordinator;
pub mod package;
pub mod provision;
pub mod publish;

pub use build::{BuildExecutor, BuildResult, BuildStatus};
pub use coordinator::{CancelToken, Coordinator, MatrixReport, TargetReport, TargetState};
pub use package::{Packager, ReleaseAsset};
pub use provision::{Provisioner, ToolchainHandle};
pub use publish::{PublishOutcome, Publisher};

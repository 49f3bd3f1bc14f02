//! Run context: what triggered this invocation and what it is building.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::core::target::TargetSpec;

/// The event kind that started a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Trigger {
    /// A pull request; never publishes.
    PullRequest,
    /// A branch push; builds and packages, never publishes.
    Push,
    /// A tag push; the only trigger that publishes.
    Tag,
}

impl FromStr for Trigger {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pull-request" | "pull_request" => Ok(Trigger::PullRequest),
            "push" => Ok(Trigger::Push),
            "tag" | "push-tag" => Ok(Trigger::Tag),
            other => Err(format!(
                "unknown trigger `{}` (expected pull-request, push, or tag)",
                other
            )),
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::PullRequest => f.write_str("pull-request"),
            Trigger::Push => f.write_str("push"),
            Trigger::Tag => f.write_str("tag"),
        }
    }
}

/// Shared context of one coordinator invocation.
#[derive(Debug, Clone, Serialize)]
pub struct RunContext {
    /// What started the run.
    pub trigger: Trigger,

    /// Branch or tag name, when known.
    pub git_ref: Option<String>,

    /// Commit reference being built, when known.
    pub commit: Option<String>,

    /// Walk the pipeline without side effects.
    pub dry_run: bool,
}

impl RunContext {
    /// Whether this run publishes on success.
    pub fn is_release(&self) -> bool {
        self.trigger == Trigger::Tag
    }

    /// Tag name for the release record; falls back to `untagged`
    /// so dry runs without a ref still format upload URLs.
    pub fn tag(&self) -> &str {
        self.git_ref.as_deref().unwrap_or("untagged")
    }
}

/// One target bound to a run context.
///
/// Created per coordinator invocation, exactly one per catalog target,
/// and dropped once its result is recorded.
#[derive(Debug, Clone)]
pub struct BuildJob {
    pub target: TargetSpec,
    pub context: RunContext,
}

impl BuildJob {
    /// Bind each selected target to the run context, one job per target.
    pub fn for_targets<'a>(
        targets: impl IntoIterator<Item = &'a TargetSpec>,
        context: &RunContext,
    ) -> Vec<BuildJob> {
        targets
            .into_iter()
            .map(|t| BuildJob {
                target: t.clone(),
                context: context.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::target::{OsClass, WordSize};

    fn spec(label: &str) -> TargetSpec {
        TargetSpec {
            label: label.into(),
            os: OsClass::Linux,
            triple: "x86_64-unknown-linux-gnu".into(),
            rename: None,
            rustflags: None,
            features: vec![],
            word_size: WordSize::default(),
            cross: false,
            cross_sha256: None,
            install_toolchain: false,
            release_exempt: false,
        }
    }

    #[test]
    fn test_trigger_parsing() {
        assert_eq!("pull-request".parse::<Trigger>(), Ok(Trigger::PullRequest));
        assert_eq!("pull_request".parse::<Trigger>(), Ok(Trigger::PullRequest));
        assert_eq!("push".parse::<Trigger>(), Ok(Trigger::Push));
        assert_eq!("tag".parse::<Trigger>(), Ok(Trigger::Tag));
        assert_eq!("push-tag".parse::<Trigger>(), Ok(Trigger::Tag));
        assert!("release".parse::<Trigger>().is_err());
    }

    #[test]
    fn test_only_tag_releases() {
        for (trigger, expected) in [
            (Trigger::PullRequest, false),
            (Trigger::Push, false),
            (Trigger::Tag, true),
        ] {
            let ctx = RunContext {
                trigger,
                git_ref: None,
                commit: None,
                dry_run: false,
            };
            assert_eq!(ctx.is_release(), expected);
        }
    }

    #[test]
    fn test_one_job_per_target() {
        let targets = vec![spec("a"), spec("b"), spec("c")];
        let ctx = RunContext {
            trigger: Trigger::Push,
            git_ref: Some("main".into()),
            commit: None,
            dry_run: false,
        };

        let jobs = BuildJob::for_targets(&targets, &ctx);
        assert_eq!(jobs.len(), 3);
        let labels: Vec<_> = jobs.iter().map(|j| j.target.label.as_str()).collect();
        assert_eq!(labels, vec!["a", "b", "c"]);
    }
}

//! Release publishing.
//!
//! Uploads packaged assets to the release endpoint. Publishing only happens
//! on a tag trigger; release-exempt assets are filtered out before any
//! upload. Asset uploads are all-or-nothing per item, so failures are
//! reported per asset, and actual uploads are serialized through a
//! single-flight lock because workers finish near-simultaneously.

use std::sync::Mutex;

use serde::Serialize;
use url::Url;

use crate::core::catalog::ReleaseConfig;
use crate::core::run::RunContext;
use crate::pipeline::package::ReleaseAsset;
use crate::util::errors::{AuthError, UploadError};

/// Per-asset outcome of one publish call.
#[derive(Debug, Default, Serialize)]
pub struct PublishOutcome {
    /// File names that uploaded successfully.
    pub uploaded: Vec<String>,

    /// Per-asset failures; other assets still uploaded.
    #[serde(serialize_with = "serialize_failures")]
    pub failed: Vec<UploadError>,
}

fn serialize_failures<S: serde::Serializer>(
    failed: &[UploadError],
    s: S,
) -> Result<S::Ok, S::Error> {
    s.collect_seq(failed.iter().map(|e| e.to_string()))
}

impl PublishOutcome {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Uploads release assets, serializing against itself.
pub struct Publisher {
    config: ReleaseConfig,
    client: reqwest::blocking::Client,
    upload_lock: Mutex<()>,
    dry_run: bool,
}

impl Publisher {
    pub fn new(config: ReleaseConfig, dry_run: bool) -> Self {
        Publisher {
            config,
            client: reqwest::blocking::Client::new(),
            upload_lock: Mutex::new(()),
            dry_run,
        }
    }

    /// Publish a batch of assets for the given run.
    ///
    /// A no-op unless the trigger is a tag push; exempt assets never reach
    /// the endpoint. Returns `AuthError` when the token is missing from the
    /// environment, otherwise per-asset results.
    pub fn publish(
        &self,
        assets: &[ReleaseAsset],
        ctx: &RunContext,
    ) -> Result<PublishOutcome, AuthError> {
        let mut outcome = PublishOutcome::default();

        if !ctx.is_release() {
            tracing::debug!("trigger `{}` does not publish", ctx.trigger);
            return Ok(outcome);
        }

        let eligible: Vec<&ReleaseAsset> = assets.iter().filter(|a| !a.release_exempt).collect();
        if eligible.is_empty() {
            return Ok(outcome);
        }

        if self.dry_run {
            for asset in eligible {
                tracing::info!("dry-run: would upload {}", asset.file_name);
                outcome.uploaded.push(asset.file_name.clone());
            }
            return Ok(outcome);
        }

        let token = std::env::var(&self.config.token_env).map_err(|_| AuthError {
            token_env: self.config.token_env.clone(),
        })?;

        for asset in eligible {
            // Single-flight: one upload against the endpoint at a time.
            let _guard = self.upload_lock.lock().unwrap();
            match self.upload_one(asset, &token, ctx) {
                Ok(()) => {
                    tracing::info!("uploaded {}", asset.file_name);
                    outcome.uploaded.push(asset.file_name.clone());
                }
                Err(err) => {
                    tracing::warn!("{}", err);
                    outcome.failed.push(err);
                }
            }
        }

        Ok(outcome)
    }

    fn upload_one(
        &self,
        asset: &ReleaseAsset,
        token: &str,
        ctx: &RunContext,
    ) -> Result<(), UploadError> {
        let template = self.config.upload_url.as_deref().ok_or_else(|| UploadError {
            asset: asset.file_name.clone(),
            detail: "no [release] upload_url configured".to_string(),
        })?;

        let url = format_upload_url(template, ctx.tag(), &asset.file_name);
        let url = Url::parse(&url).map_err(|e| UploadError {
            asset: asset.file_name.clone(),
            detail: format!("invalid upload URL `{}`: {}", url, e),
        })?;

        let bytes = std::fs::read(&asset.path).map_err(|e| UploadError {
            asset: asset.file_name.clone(),
            detail: format!("failed to read staged asset: {}", e),
        })?;

        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(bytes)
            .send()
            .map_err(|e| UploadError {
                asset: asset.file_name.clone(),
                detail: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(UploadError {
                asset: asset.file_name.clone(),
                detail: format!("HTTP {}", response.status()),
            });
        }

        Ok(())
    }
}

/// Substitute `{tag}` and `{name}` in the endpoint template.
fn format_upload_url(template: &str, tag: &str, name: &str) -> String {
    template.replace("{tag}", tag).replace("{name}", name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::run::Trigger;
    use std::path::PathBuf;

    fn asset(name: &str, exempt: bool) -> ReleaseAsset {
        ReleaseAsset {
            path: PathBuf::from(format!("/nonexistent/{}", name)),
            file_name: name.to_string(),
            checksum: None,
            release_exempt: exempt,
        }
    }

    fn ctx(trigger: Trigger) -> RunContext {
        RunContext {
            trigger,
            git_ref: Some("v1.2.0".into()),
            commit: None,
            dry_run: false,
        }
    }

    #[test]
    fn test_pull_request_never_publishes() {
        // No token in the environment and no endpoint configured: an actual
        // publish attempt would fail, so a clean outcome proves the early
        // return.
        let publisher = Publisher::new(ReleaseConfig::default(), false);
        let outcome = publisher
            .publish(&[asset("a.so", false)], &ctx(Trigger::PullRequest))
            .unwrap();
        assert!(outcome.uploaded.is_empty());
        assert!(outcome.is_clean());
    }

    #[test]
    fn test_exempt_assets_filtered_before_auth() {
        let config = ReleaseConfig {
            token_env: "SLIPWAY_TEST_TOKEN_THAT_IS_NOT_SET".into(),
            ..Default::default()
        };
        let publisher = Publisher::new(config, false);

        // Only exempt assets on a tag trigger: no upload is attempted, so
        // the missing token is never even consulted.
        let outcome = publisher
            .publish(&[asset("a.so", true)], &ctx(Trigger::Tag))
            .unwrap();
        assert!(outcome.uploaded.is_empty());
    }

    #[test]
    fn test_missing_token_is_auth_error() {
        let config = ReleaseConfig {
            token_env: "SLIPWAY_TEST_TOKEN_THAT_IS_NOT_SET".into(),
            ..Default::default()
        };
        let publisher = Publisher::new(config, false);

        let err = publisher
            .publish(&[asset("a.so", false)], &ctx(Trigger::Tag))
            .unwrap_err();
        assert!(err.to_string().contains("SLIPWAY_TEST_TOKEN_THAT_IS_NOT_SET"));
    }

    #[test]
    fn test_per_asset_failure_does_not_abort_batch() {
        // Token present but no upload_url: every asset fails individually
        // and the batch still processes all of them.
        std::env::set_var("SLIPWAY_TEST_TOKEN_SET", "secret");
        let config = ReleaseConfig {
            token_env: "SLIPWAY_TEST_TOKEN_SET".into(),
            upload_url: None,
        };
        let publisher = Publisher::new(config, false);

        let outcome = publisher
            .publish(&[asset("a.so", false), asset("b.so", false)], &ctx(Trigger::Tag))
            .unwrap();
        assert_eq!(outcome.failed.len(), 2);
        assert!(outcome.uploaded.is_empty());
    }

    #[test]
    fn test_dry_run_reports_without_network() {
        let publisher = Publisher::new(ReleaseConfig::default(), true);
        let outcome = publisher
            .publish(&[asset("a.so", false), asset("b.so", true)], &ctx(Trigger::Tag))
            .unwrap();
        // The exempt asset is filtered even in dry runs.
        assert_eq!(outcome.uploaded, vec!["a.so".to_string()]);
    }

    #[test]
    fn test_format_upload_url() {
        let url = format_upload_url(
            "https://uploads.example.com/releases/{tag}/assets?name={name}",
            "v1.2.0",
            "libplugin-x86_64_v3-unknown-linux-gnu-64bit.so",
        );
        assert_eq!(
            url,
            "https://uploads.example.com/releases/v1.2.0/assets?name=libplugin-x86_64_v3-unknown-linux-gnu-64bit.so"
        );
    }
}

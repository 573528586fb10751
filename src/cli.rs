//! CLI argument parsing for the publish workflow.
//!
//! The CLI is intentionally thin: version and artifact directory come from
//! flags, everything else (credentials, registry coordinates) from the
//! environment, resolved once in [`crate::config`].
use clap::Parser;
use std::path::PathBuf;

/// Root CLI entrypoint for publishing a provider release.
#[derive(Parser, Debug)]
#[command(
    name = "tfe-publish",
    version,
    about = "Upload a Terraform provider release to a private TFE registry",
    after_help = "Environment:\n  TFE_TOKEN       TFE API token (required)\n  GPG_KEY_ID      GPG key fingerprint used for signing (required)\n  TFE_HOST        TFE hostname (default: terraform.lambdalabs.cloud)\n  TFE_ORG         TFE organization (default: lambdacloud)\n  PROVIDER_NAME   Provider name (default: okta)\n\nExamples:\n  export TFE_TOKEN=... GPG_KEY_ID=...\n  tfe-publish --version 1.0.0\n  tfe-publish --version 1.0.0 --dist-dir build/release"
)]
pub struct Args {
    /// Provider version to publish (without a leading v)
    #[arg(long, value_name = "VERSION")]
    pub version: String,

    /// Directory containing the release artifacts
    #[arg(long, value_name = "DIR", default_value = "dist")]
    pub dist_dir: PathBuf,
}

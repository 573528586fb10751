//! Publish configuration captured once from the CLI and environment.
//!
//! The workflow never reads the environment itself; everything it needs is
//! resolved here up front, so a missing credential aborts the run before any
//! network call is attempted.
use crate::cli::Args;
use anyhow::{anyhow, Result};
use std::env;
use std::path::PathBuf;

pub const DEFAULT_HOST: &str = "terraform.lambdalabs.cloud";
pub const DEFAULT_ORG: &str = "lambdacloud";
pub const DEFAULT_PROVIDER: &str = "okta";

/// Immutable inputs for one publish run.
#[derive(Debug, Clone)]
pub struct PublishConfig {
    pub provider: String,
    pub version: String,
    pub org: String,
    pub host: String,
    pub dist_dir: PathBuf,
    pub token: String,
    pub gpg_key_id: String,
}

impl PublishConfig {
    /// Resolve configuration from CLI arguments and the process environment.
    pub fn from_env(args: &Args) -> Result<Self> {
        let token = required_env("TFE_TOKEN")?;
        let gpg_key_id = required_env("GPG_KEY_ID")?;
        Ok(Self {
            provider: env_or("PROVIDER_NAME", DEFAULT_PROVIDER),
            version: args.version.clone(),
            org: env_or("TFE_ORG", DEFAULT_ORG),
            host: env_or("TFE_HOST", DEFAULT_HOST),
            dist_dir: args.dist_dir.clone(),
            token,
            gpg_key_id,
        })
    }

    /// Root of the versioned registry API.
    pub fn api_base(&self) -> String {
        format!("https://{}/api/v2", self.host)
    }

    /// Browser URL for the published provider, printed in the final summary.
    pub fn registry_url(&self) -> String {
        format!(
            "https://{}/app/{}/registry/providers/private/{}/{}",
            self.host, self.org, self.org, self.provider
        )
    }

    pub fn gpg_key_path(&self) -> PathBuf {
        self.dist_dir.join("gpg-public-key.asc")
    }

    /// `terraform-provider-{name}_{version}_SHA256SUMS` within the dist dir.
    pub fn shasums_path(&self) -> PathBuf {
        self.dist_dir.join(format!(
            "terraform-provider-{}_{}_SHA256SUMS",
            self.provider, self.version
        ))
    }

    /// Detached signature sibling of [`Self::shasums_path`].
    pub fn shasums_sig_path(&self) -> PathBuf {
        self.dist_dir.join(format!(
            "terraform-provider-{}_{}_SHA256SUMS.sig",
            self.provider, self.version
        ))
    }
}

fn required_env(name: &str) -> Result<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| anyhow!("{name} environment variable is required"))
}

fn env_or(name: &str, default: &str) -> String {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> PublishConfig {
        PublishConfig {
            provider: "okta".to_string(),
            version: "1.2.3".to_string(),
            org: "lambdacloud".to_string(),
            host: "tfe.example.test".to_string(),
            dist_dir: PathBuf::from("dist"),
            token: "t0ken".to_string(),
            gpg_key_id: "ABCDEF0123456789".to_string(),
        }
    }

    #[test]
    fn shasums_paths_follow_the_release_naming_pattern() {
        let config = config();
        assert_eq!(
            config.shasums_path(),
            PathBuf::from("dist/terraform-provider-okta_1.2.3_SHA256SUMS")
        );
        assert_eq!(
            config.shasums_sig_path(),
            PathBuf::from("dist/terraform-provider-okta_1.2.3_SHA256SUMS.sig")
        );
    }

    #[test]
    fn registry_url_points_at_the_private_provider_page() {
        assert_eq!(
            config().registry_url(),
            "https://tfe.example.test/app/lambdacloud/registry/providers/private/lambdacloud/okta"
        );
    }

    #[test]
    fn api_base_is_versioned() {
        assert_eq!(config().api_base(), "https://tfe.example.test/api/v2");
    }
}

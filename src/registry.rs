//! TFE registry API client.
//!
//! Requests use the JSON:API envelope the registry expects
//! (`{"data": {"type": ..., "attributes": ...}}`) and authenticate with a
//! bearer token. Pre-signed artifact upload links returned by the registry
//! are PUT raw bytes with no additional headers; the links authorize
//! themselves.
//!
//! Non-2xx statuses are surfaced as values rather than transport errors
//! because the workflow's idempotency handling needs to classify them: a 422
//! on provider creation means the provider already exists, not that the run
//! failed. The [`Registry`] trait is the seam the workflow is tested
//! against.

use crate::config::PublishConfig;
use crate::shasums::PlatformEntry;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Protocol versions advertised on every created provider version.
const PROTOCOL_VERSIONS: &[&str] = &["5.0"];

/// Bound on each registry request. The original workflow had no timeout;
/// this keeps a wedged registry from hanging the run indefinitely.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Bytes of response body quoted back in diagnostics.
const BODY_EXCERPT_BYTES: usize = 200;

/// Result of an idempotent create call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnsureOutcome {
    Created,
    AlreadyExists,
    Failed(String),
}

/// Result of registering one platform build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformOutcome {
    Created { upload_url: String },
    Failed(String),
}

/// Upload links returned by version creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedVersion {
    pub shasums_upload: String,
    pub shasums_sig_upload: String,
}

/// The registry operations the publish workflow depends on.
#[cfg_attr(test, mockall::automock)]
pub trait Registry {
    /// Create the provider record, tolerating prior existence.
    fn ensure_provider(&self) -> Result<EnsureOutcome>;

    /// Upload the GPG public key, tolerating prior existence.
    fn ensure_gpg_key(&self, ascii_armor: &str) -> Result<EnsureOutcome>;

    /// Create the version record. Fails unless the registry reports 201,
    /// because everything after this step needs the returned upload links.
    fn create_version(&self) -> Result<CreatedVersion>;

    /// Register one platform build for the current version.
    fn create_platform(&self, entry: &PlatformEntry) -> Result<PlatformOutcome>;

    /// PUT raw bytes to a pre-signed upload link, requiring HTTP 200.
    fn put_artifact(&self, url: &str, body: &[u8]) -> Result<()>;
}

#[derive(Serialize)]
struct Envelope<A> {
    data: Payload<A>,
}

#[derive(Serialize)]
struct Payload<A> {
    #[serde(rename = "type")]
    kind: &'static str,
    attributes: A,
}

impl<A> Envelope<A> {
    fn new(kind: &'static str, attributes: A) -> Self {
        Self {
            data: Payload { kind, attributes },
        }
    }
}

#[derive(Serialize)]
struct ProviderAttrs<'a> {
    name: &'a str,
    namespace: &'a str,
    #[serde(rename = "registry-name")]
    registry_name: &'a str,
}

#[derive(Serialize)]
struct GpgKeyAttrs<'a> {
    namespace: &'a str,
    #[serde(rename = "ascii-armor")]
    ascii_armor: &'a str,
}

#[derive(Serialize)]
struct VersionAttrs<'a> {
    version: &'a str,
    #[serde(rename = "key-id")]
    key_id: &'a str,
    protocols: &'a [&'a str],
}

#[derive(Serialize)]
struct PlatformAttrs<'a> {
    os: &'a str,
    arch: &'a str,
    shasum: &'a str,
    filename: &'a str,
}

#[derive(Deserialize)]
struct Document<L> {
    data: DocumentData<L>,
}

#[derive(Deserialize)]
struct DocumentData<L> {
    links: L,
}

#[derive(Deserialize)]
struct VersionLinks {
    #[serde(rename = "shasums-upload")]
    shasums_upload: String,
    #[serde(rename = "shasums-sig-upload")]
    shasums_sig_upload: String,
}

#[derive(Deserialize)]
struct PlatformLinks {
    #[serde(rename = "provider-binary-upload")]
    provider_binary_upload: String,
}

/// `ureq`-backed client against a live TFE instance.
pub struct HttpRegistry {
    agent: ureq::Agent,
    config: PublishConfig,
}

impl HttpRegistry {
    pub fn new(config: &PublishConfig) -> Self {
        let agent_config = ureq::Agent::config_builder()
            .timeout_global(Some(REQUEST_TIMEOUT))
            .http_status_as_error(false)
            .build();
        Self {
            agent: ureq::Agent::new_with_config(agent_config),
            config: config.clone(),
        }
    }

    /// POST a JSON:API envelope, returning the status and raw body.
    fn post_json<A: Serialize>(&self, url: &str, body: &Envelope<A>) -> Result<(u16, String)> {
        let bearer = format!("Bearer {}", self.config.token);
        let response = self
            .agent
            .post(url)
            .header("Authorization", bearer.as_str())
            .header("Content-Type", "application/vnd.api+json")
            .send_json(body)
            .with_context(|| format!("POST {url}"))?;
        let status = response.status().as_u16();
        let text = response
            .into_body()
            .read_to_string()
            .with_context(|| format!("read response from {url}"))?;
        tracing::debug!(url, status, body_bytes = text.len(), "registry response");
        Ok((status, text))
    }

    fn versions_url(&self) -> String {
        format!(
            "{}/organizations/{}/registry-providers/private/{}/{}/versions",
            self.config.api_base(),
            self.config.org,
            self.config.org,
            self.config.provider
        )
    }
}

impl Registry for HttpRegistry {
    fn ensure_provider(&self) -> Result<EnsureOutcome> {
        let url = format!(
            "{}/organizations/{}/registry-providers",
            self.config.api_base(),
            self.config.org
        );
        let body = Envelope::new(
            "registry-providers",
            ProviderAttrs {
                name: &self.config.provider,
                namespace: &self.config.org,
                registry_name: "private",
            },
        );
        let (status, text) = self.post_json(&url, &body)?;
        Ok(provider_outcome(status, &text))
    }

    fn ensure_gpg_key(&self, ascii_armor: &str) -> Result<EnsureOutcome> {
        // GPG keys live under the registry API root, not /api/v2.
        let url = format!(
            "https://{}/api/registry/private/v2/gpg-keys",
            self.config.host
        );
        let body = Envelope::new(
            "gpg-keys",
            GpgKeyAttrs {
                namespace: &self.config.org,
                ascii_armor,
            },
        );
        let (status, text) = self.post_json(&url, &body)?;
        Ok(gpg_key_outcome(status, &text))
    }

    fn create_version(&self) -> Result<CreatedVersion> {
        let body = Envelope::new(
            "registry-provider-versions",
            VersionAttrs {
                version: &self.config.version,
                key_id: &self.config.gpg_key_id,
                protocols: PROTOCOL_VERSIONS,
            },
        );
        let (status, text) = self.post_json(&self.versions_url(), &body)?;
        if status != 201 {
            return Err(anyhow!("create version returned {status} - {text}"));
        }
        let document: Document<VersionLinks> = serde_json::from_str(&text).with_context(|| {
            format!(
                "parse version response: {}",
                excerpt(&text, BODY_EXCERPT_BYTES)
            )
        })?;
        Ok(CreatedVersion {
            shasums_upload: document.data.links.shasums_upload,
            shasums_sig_upload: document.data.links.shasums_sig_upload,
        })
    }

    fn create_platform(&self, entry: &PlatformEntry) -> Result<PlatformOutcome> {
        let url = format!("{}/{}/platforms", self.versions_url(), self.config.version);
        let body = Envelope::new(
            "registry-provider-version-platforms",
            PlatformAttrs {
                os: &entry.os,
                arch: &entry.arch,
                shasum: &entry.shasum,
                filename: &entry.filename,
            },
        );
        let (status, text) = self.post_json(&url, &body)?;
        if status != 201 {
            return Ok(PlatformOutcome::Failed(format!(
                "{status} - {}",
                excerpt(&text, 100)
            )));
        }
        let document: Document<PlatformLinks> = serde_json::from_str(&text).with_context(|| {
            format!(
                "parse platform response: {}",
                excerpt(&text, BODY_EXCERPT_BYTES)
            )
        })?;
        Ok(PlatformOutcome::Created {
            upload_url: document.data.links.provider_binary_upload,
        })
    }

    fn put_artifact(&self, url: &str, body: &[u8]) -> Result<()> {
        let response = self
            .agent
            .put(url)
            .send(body)
            .with_context(|| format!("PUT {url}"))?;
        let status = response.status().as_u16();
        if status != 200 {
            let text = response.into_body().read_to_string().unwrap_or_default();
            return Err(anyhow!(
                "upload returned {status} - {}",
                excerpt(&text, BODY_EXCERPT_BYTES)
            ));
        }
        Ok(())
    }
}

/// Classify a provider-create response. The registry reports an existing
/// provider as a 422 uniqueness violation.
fn provider_outcome(status: u16, body: &str) -> EnsureOutcome {
    match status {
        201 => EnsureOutcome::Created,
        422 => EnsureOutcome::AlreadyExists,
        _ => EnsureOutcome::Failed(format!("{status} - {}", excerpt(body, BODY_EXCERPT_BYTES))),
    }
}

/// Classify a GPG key upload. Duplicates come back either as a 422 or with
/// an "already exists" message in the body.
fn gpg_key_outcome(status: u16, body: &str) -> EnsureOutcome {
    match status {
        200 | 201 => EnsureOutcome::Created,
        422 => EnsureOutcome::AlreadyExists,
        _ if body.to_lowercase().contains("already exists") => EnsureOutcome::AlreadyExists,
        _ => EnsureOutcome::Failed(format!("{status} - {}", excerpt(body, BODY_EXCERPT_BYTES))),
    }
}

/// Truncate to at most `max_bytes` without splitting a character.
fn excerpt(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }
    let mut truncated = String::new();
    for ch in text.chars() {
        if truncated.len() + ch.len_utf8() > max_bytes {
            break;
        }
        truncated.push(ch);
    }
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn provider_create_maps_201_and_422_to_success() {
        assert_eq!(provider_outcome(201, ""), EnsureOutcome::Created);
        assert_eq!(provider_outcome(422, "{\"errors\":[]}"), EnsureOutcome::AlreadyExists);
    }

    #[test]
    fn provider_create_surfaces_other_statuses() {
        let EnsureOutcome::Failed(detail) = provider_outcome(500, "boom") else {
            panic!("expected failure");
        };
        assert!(detail.contains("500"));
        assert!(detail.contains("boom"));
    }

    #[test]
    fn gpg_key_duplicate_detected_by_status_or_body() {
        assert_eq!(gpg_key_outcome(422, ""), EnsureOutcome::AlreadyExists);
        assert_eq!(
            gpg_key_outcome(409, "GPG key Already Exists for namespace"),
            EnsureOutcome::AlreadyExists
        );
        assert_eq!(gpg_key_outcome(200, ""), EnsureOutcome::Created);
        assert_eq!(gpg_key_outcome(201, ""), EnsureOutcome::Created);
    }

    #[test]
    fn gpg_key_other_failures_keep_the_status_and_body() {
        let EnsureOutcome::Failed(detail) = gpg_key_outcome(403, "forbidden") else {
            panic!("expected failure");
        };
        assert!(detail.contains("403"));
        assert!(detail.contains("forbidden"));
    }

    #[test]
    fn envelope_serializes_the_jsonapi_shape() {
        let body = Envelope::new(
            "registry-provider-versions",
            VersionAttrs {
                version: "1.0.0",
                key_id: "ABCDEF0123456789",
                protocols: PROTOCOL_VERSIONS,
            },
        );
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({
                "data": {
                    "type": "registry-provider-versions",
                    "attributes": {
                        "version": "1.0.0",
                        "key-id": "ABCDEF0123456789",
                        "protocols": ["5.0"]
                    }
                }
            })
        );
    }

    #[test]
    fn platform_attrs_use_flat_names() {
        let body = Envelope::new(
            "registry-provider-version-platforms",
            PlatformAttrs {
                os: "linux",
                arch: "amd64",
                shasum: "f00dcafe",
                filename: "terraform-provider-okta_1.0.0_linux_amd64.zip",
            },
        );
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({
                "data": {
                    "type": "registry-provider-version-platforms",
                    "attributes": {
                        "os": "linux",
                        "arch": "amd64",
                        "shasum": "f00dcafe",
                        "filename": "terraform-provider-okta_1.0.0_linux_amd64.zip"
                    }
                }
            })
        );
    }

    #[test]
    fn parses_upload_links_from_a_version_response() {
        let text = r#"{
            "data": {
                "id": "provver-1",
                "links": {
                    "shasums-upload": "https://archivist.example.test/shasums",
                    "shasums-sig-upload": "https://archivist.example.test/shasums-sig"
                }
            }
        }"#;
        let document: Document<VersionLinks> = serde_json::from_str(text).unwrap();
        assert_eq!(
            document.data.links.shasums_upload,
            "https://archivist.example.test/shasums"
        );
        assert_eq!(
            document.data.links.shasums_sig_upload,
            "https://archivist.example.test/shasums-sig"
        );
    }

    #[test]
    fn excerpt_respects_character_boundaries() {
        assert_eq!(excerpt("short", 100), "short");
        assert_eq!(excerpt("abcdef", 3), "abc");
        // Multi-byte characters are never split.
        assert_eq!(excerpt("héllo", 2), "h");
    }
}

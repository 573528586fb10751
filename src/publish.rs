//! The five-step publish workflow against the registry.
//!
//! Steps run strictly in order because the registry enforces the same
//! dependency chain: a version cannot exist without its provider, and
//! platform registrations are rejected until the checksum list and its
//! signature are in place.
//!
//! Failure posture is two-tier. Structural problems (missing credentials or
//! files, version creation, checksum uploads) abort the run; each platform
//! entry fails independently and is only counted. Provider and key creation
//! are idempotent: "already exists" is success, and any other unexpected
//! response is logged and carried past, since a genuine registration problem
//! resurfaces as a hard failure at version creation.

use crate::config::PublishConfig;
use crate::registry::{CreatedVersion, EnsureOutcome, PlatformOutcome, Registry};
use crate::shasums::{parse_checksum_line, ChecksumLine, PlatformEntry};
use anyhow::{Context, Result};
use std::fs;
use std::io::{self, Write};

/// Per-platform counters for the final summary and exit status.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PublishReport {
    pub uploaded: usize,
    pub failed: usize,
}

/// Run the full publish sequence against `registry`.
pub fn run(config: &PublishConfig, registry: &dyn Registry) -> Result<PublishReport> {
    println!(
        "==> Uploading {} v{} to {}/{}",
        config.provider, config.version, config.host, config.org
    );

    ensure_provider(registry)?;
    ensure_gpg_key(config, registry)?;
    let version = create_version(config, registry)?;
    let shasums = upload_checksums(config, registry, &version)?;
    let report = upload_platforms(config, registry, &shasums)?;

    println!();
    println!(
        "==> Upload complete! ({} succeeded, {} failed)",
        report.uploaded, report.failed
    );
    println!("==> {}", config.registry_url());
    Ok(report)
}

fn ensure_provider(registry: &dyn Registry) -> Result<()> {
    println!("==> Step 1: Creating provider (if not exists)...");
    match registry.ensure_provider()? {
        EnsureOutcome::Created => println!("    Provider created"),
        EnsureOutcome::AlreadyExists => println!("    Provider already exists"),
        EnsureOutcome::Failed(detail) => {
            tracing::warn!(detail = %detail, "provider create not confirmed");
            println!("    Response: {detail}");
        }
    }
    Ok(())
}

fn ensure_gpg_key(config: &PublishConfig, registry: &dyn Registry) -> Result<()> {
    println!("==> Step 2: Uploading GPG key...");
    let key_path = config.gpg_key_path();
    let ascii_armor = fs::read_to_string(&key_path)
        .with_context(|| format!("GPG public key not found at {}", key_path.display()))?;
    match registry.ensure_gpg_key(&ascii_armor)? {
        EnsureOutcome::Created => println!("    GPG key uploaded: {}", config.gpg_key_id),
        EnsureOutcome::AlreadyExists => println!("    GPG key already exists"),
        EnsureOutcome::Failed(detail) => {
            tracing::warn!(detail = %detail, "gpg key upload not confirmed");
            println!("    WARNING: GPG key upload response: {detail}");
        }
    }
    Ok(())
}

fn create_version(config: &PublishConfig, registry: &dyn Registry) -> Result<CreatedVersion> {
    println!("==> Step 3: Creating version {}...", config.version);
    let version = registry.create_version().context("create version")?;
    println!("    Version created");
    Ok(version)
}

/// Upload the checksum list and its detached signature, returning the list
/// contents for the platform loop.
fn upload_checksums(
    config: &PublishConfig,
    registry: &dyn Registry,
    version: &CreatedVersion,
) -> Result<String> {
    println!("==> Step 4: Uploading checksums...");
    let shasums_path = config.shasums_path();
    let shasums = fs::read_to_string(&shasums_path)
        .with_context(|| format!("SHA256SUMS not found at {}", shasums_path.display()))?;
    registry
        .put_artifact(&version.shasums_upload, shasums.as_bytes())
        .context("upload SHA256SUMS")?;
    println!("    SHA256SUMS uploaded");

    let sig_path = config.shasums_sig_path();
    let signature = fs::read(&sig_path)
        .with_context(|| format!("SHA256SUMS.sig not found at {}", sig_path.display()))?;
    registry
        .put_artifact(&version.shasums_sig_upload, &signature)
        .context("upload SHA256SUMS.sig")?;
    println!("    SHA256SUMS.sig uploaded");

    Ok(shasums)
}

fn upload_platforms(
    config: &PublishConfig,
    registry: &dyn Registry,
    shasums: &str,
) -> Result<PublishReport> {
    println!("==> Step 5: Uploading platform binaries...");
    let mut report = PublishReport::default();

    for line in shasums.lines() {
        let entry = match parse_checksum_line(line) {
            ChecksumLine::Entry(entry) => entry,
            ChecksumLine::MalformedName { filename } => {
                tracing::warn!(filename = %filename, "cannot parse OS/arch from filename");
                println!("    Skipping {filename} - cannot parse OS/arch");
                continue;
            }
            ChecksumLine::Ignored => continue,
        };
        if upload_platform(config, registry, &entry)? {
            report.uploaded += 1;
        } else {
            report.failed += 1;
        }
    }

    Ok(report)
}

/// Register and upload one platform binary.
///
/// Returns `Ok(false)` on any per-entry failure; sibling entries are
/// unaffected either way.
fn upload_platform(
    config: &PublishConfig,
    registry: &dyn Registry,
    entry: &PlatformEntry,
) -> Result<bool> {
    print!("    {}_{}... ", entry.os, entry.arch);
    let _ = io::stdout().flush();

    let upload_url = match registry.create_platform(entry) {
        Ok(PlatformOutcome::Created { upload_url }) => upload_url,
        Ok(PlatformOutcome::Failed(detail)) => {
            println!("ERROR: {detail}");
            return Ok(false);
        }
        Err(err) => {
            println!("ERROR: {err:#}");
            return Ok(false);
        }
    };

    let binary_path = config.dist_dir.join(&entry.filename);
    if !binary_path.is_file() {
        println!("ERROR: Binary not found at {}", binary_path.display());
        return Ok(false);
    }
    let bytes = fs::read(&binary_path)
        .with_context(|| format!("read binary at {}", binary_path.display()))?;

    match registry.put_artifact(&upload_url, &bytes) {
        Ok(()) => {
            println!("done");
            Ok(true)
        }
        Err(err) => {
            println!("ERROR uploading: {err:#}");
            Ok(false)
        }
    }
}

//! Checksum-list parsing for release artifacts.
//!
//! A SHA256SUMS file maps artifact filenames to hex digests, one per line.
//! Platform targets are recovered from the artifact filename itself:
//! `terraform-provider-okta_1.0.0_linux_amd64.zip` names the `linux/amd64`
//! build. Lines that do not fit either shape are skipped, never fatal.

/// One platform artifact referenced by the checksum list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformEntry {
    pub shasum: String,
    pub filename: String,
    pub os: String,
    pub arch: String,
}

/// Outcome of parsing a single checksum line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChecksumLine {
    /// A well-formed `<digest> <filename>` line with a parseable platform.
    Entry(PlatformEntry),
    /// Two tokens, but the filename does not decompose into os/arch.
    MalformedName { filename: String },
    /// Blank or otherwise not a two-token checksum line.
    Ignored,
}

/// Parse one line of a SHA256SUMS file.
pub fn parse_checksum_line(line: &str) -> ChecksumLine {
    let mut tokens = line.split_whitespace();
    let (Some(shasum), Some(filename), None) = (tokens.next(), tokens.next(), tokens.next())
    else {
        return ChecksumLine::Ignored;
    };
    match platform_from_filename(filename) {
        Some((os, arch)) => ChecksumLine::Entry(PlatformEntry {
            shasum: shasum.to_string(),
            filename: filename.to_string(),
            os,
            arch,
        }),
        None => ChecksumLine::MalformedName {
            filename: filename.to_string(),
        },
    }
}

/// Derive `(os, arch)` from an artifact filename.
///
/// A trailing `.zip` is stripped and the name split on `_`; the last two
/// segments name the platform. Names with fewer than four segments carry no
/// platform and are rejected.
pub fn platform_from_filename(filename: &str) -> Option<(String, String)> {
    let stem = filename.strip_suffix(".zip").unwrap_or(filename);
    let segments: Vec<&str> = stem.split('_').collect();
    if segments.len() < 4 {
        return None;
    }
    let os = segments[segments.len() - 2];
    let arch = segments[segments.len() - 1];
    Some((os.to_string(), arch.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_platform_from_release_filename() {
        assert_eq!(
            platform_from_filename("terraform-provider-okta_1.0.0_linux_amd64.zip"),
            Some(("linux".to_string(), "amd64".to_string()))
        );
    }

    #[test]
    fn rejects_names_with_too_few_segments() {
        assert_eq!(platform_from_filename("terraform-provider-okta_1.0.0.zip"), None);
        assert_eq!(platform_from_filename("terraform-provider-okta.zip"), None);
    }

    #[test]
    fn strips_only_a_trailing_zip_extension() {
        assert_eq!(
            platform_from_filename("terraform-provider-okta_1.0.0_darwin_arm64"),
            Some(("darwin".to_string(), "arm64".to_string()))
        );
    }

    #[test]
    fn parses_a_two_token_line_into_an_entry() {
        let line = "f00dcafe  terraform-provider-okta_1.0.0_windows_amd64.zip";
        let ChecksumLine::Entry(entry) = parse_checksum_line(line) else {
            panic!("expected an entry");
        };
        assert_eq!(entry.shasum, "f00dcafe");
        assert_eq!(entry.filename, "terraform-provider-okta_1.0.0_windows_amd64.zip");
        assert_eq!(entry.os, "windows");
        assert_eq!(entry.arch, "amd64");
    }

    #[test]
    fn ignores_blank_and_malformed_lines() {
        assert_eq!(parse_checksum_line(""), ChecksumLine::Ignored);
        assert_eq!(parse_checksum_line("   "), ChecksumLine::Ignored);
        assert_eq!(parse_checksum_line("justonetoken"), ChecksumLine::Ignored);
        assert_eq!(parse_checksum_line("one two three"), ChecksumLine::Ignored);
    }

    #[test]
    fn flags_filenames_without_platform_segments() {
        assert_eq!(
            parse_checksum_line("f00dcafe terraform-provider-okta_1.0.0.zip"),
            ChecksumLine::MalformedName {
                filename: "terraform-provider-okta_1.0.0.zip".to_string()
            }
        );
    }
}

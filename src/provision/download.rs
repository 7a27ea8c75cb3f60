// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Release artifact retrieval.
//!
//! Utilities to fetch release artifacts and installer scripts, verify them
//! against SHA-256 digests when the manifest supplies one, and pull the
//! executable out of an archive.

use crate::config::ArchiveKind;

use flate2::read::GzDecoder;
use indicatif::{ProgressBar, ProgressStyle};
use sha2::{Digest, Sha256};
use std::{
    ffi::OsStr,
    fs::{set_permissions, write, Permissions},
    io::Read,
    path::{Path, PathBuf},
    time::Duration,
};
use tar::Archive;
use tracing::{debug, info, instrument, trace};

/// Retrieve remote artifacts.
pub trait Fetcher {
    /// Fetch full body of target URL.
    ///
    /// # Errors
    ///
    /// - Return [`DownloadError`] if the request fails or the server does not
    ///   answer with success.
    fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Fetch artifacts over HTTP(S) with a progress bar.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    /// Construct new HTTP fetcher whose requests give up after `timeout`.
    ///
    /// # Errors
    ///
    /// - Return [`DownloadError::Client`] if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("rigup/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(DownloadError::Client)?;

        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    #[instrument(skip(self), level = "debug")]
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        info!("download {url}");
        let mut response = self
            .client
            .get(url)
            .send()
            .map_err(|err| DownloadError::Http {
                source: err,
                url: url.into(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::Status {
                url: url.into(),
                status: status.as_u16(),
            });
        }

        let bar = match response.content_length() {
            Some(length) => {
                let bar = ProgressBar::new(length);
                bar.set_style(
                    ProgressStyle::with_template(
                        "{elapsed_precise:.green}  {msg:<50}  [{wide_bar:.yellow/blue}]",
                    )?
                    .progress_chars("-Cco."),
                );
                bar
            }
            None => {
                let bar = ProgressBar::new_spinner();
                bar.set_style(ProgressStyle::with_template(
                    "{elapsed_precise:.green}  {msg:<50}  {spinner} {bytes}",
                )?);
                bar
            }
        };
        bar.set_message(artifact_name(url).to_string());
        bar.enable_steady_tick(Duration::from_millis(100));

        let mut body = Vec::new();
        let mut buffer = [0u8; 8192];
        loop {
            let read = response.read(&mut buffer).map_err(|err| DownloadError::Read {
                source: err,
                url: url.into(),
            })?;
            if read == 0 {
                break;
            }
            body.extend_from_slice(&buffer[..read]);
            bar.inc(read as u64);
        }
        bar.finish_and_clear();
        debug!("fetched {} bytes from {url}", body.len());

        Ok(body)
    }
}

/// Last path segment of URL, used as a display name.
pub fn artifact_name(url: &str) -> &str {
    url.rsplit('/').find(|part| !part.is_empty()).unwrap_or(url)
}

/// Lowercase hex SHA-256 digest of bytes.
pub fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

/// Verify bytes against expected SHA-256 hex digest.
///
/// # Errors
///
/// - Return [`DownloadError::ChecksumMismatch`] if digests differ.
pub fn verify_sha256(bytes: &[u8], expected: &str, artifact: &str) -> Result<()> {
    let actual = sha256_hex(bytes);
    if !actual.eq_ignore_ascii_case(expected.trim()) {
        return Err(DownloadError::ChecksumMismatch {
            artifact: artifact.into(),
            expected: expected.trim().into(),
            actual,
        });
    }

    debug!("sha256 of {artifact} verified");
    Ok(())
}

/// Extract digest from a detached SHA-256 sum file.
///
/// Sum files hold `<digest>  <file name>`, or just the digest. Only the first
/// token is considered, and it must be 64 hex characters.
pub fn parse_sum_file(content: &str) -> Option<&str> {
    content
        .split_whitespace()
        .next()
        .filter(|digest| digest.len() == 64 && digest.chars().all(|c| c.is_ascii_hexdigit()))
}

/// Pull executable contents out of a downloaded artifact.
///
/// A bare binary artifact is returned as is. For a tarball, the entry whose
/// path equals `binary` is taken. When `binary` is a plain file name, the
/// first regular file with that name anywhere in the tarball matches too, as
/// release tarballs often wrap everything in a versioned directory.
///
/// # Errors
///
/// - Return [`DownloadError::Archive`] if the tarball cannot be read.
/// - Return [`DownloadError::BinaryNotFound`] if no entry matches.
pub fn extract_binary(artifact: &[u8], kind: ArchiveKind, binary: &str) -> Result<Vec<u8>> {
    if kind == ArchiveKind::Binary {
        return Ok(artifact.to_vec());
    }

    let wanted = binary.trim_start_matches("./").trim_start_matches('/');
    let by_name = !wanted.contains('/');
    let mut archive = Archive::new(GzDecoder::new(artifact));

    for entry in archive.entries().map_err(DownloadError::Archive)? {
        let mut entry = entry.map_err(DownloadError::Archive)?;
        if !entry.header().entry_type().is_file() {
            continue;
        }

        let path = entry.path().map_err(DownloadError::Archive)?.into_owned();
        let path_str = path.to_string_lossy();
        let entry_path = path_str.trim_start_matches("./").trim_start_matches('/');
        trace!("checking archive entry {entry_path}");

        let matched = entry_path == wanted
            || (by_name && path.file_name().is_some_and(|name| name == OsStr::new(wanted)));
        if matched {
            let mut content = Vec::new();
            entry
                .read_to_end(&mut content)
                .map_err(DownloadError::Archive)?;
            debug!("extracted {entry_path} from archive");
            return Ok(content);
        }
    }

    Err(DownloadError::BinaryNotFound {
        binary: binary.into(),
    })
}

/// Write bytes to path as an executable file with mode 0755.
///
/// # Errors
///
/// - Return [`DownloadError::Write`] if the file cannot be written.
pub fn write_executable(path: &Path, bytes: &[u8]) -> Result<()> {
    let map_err = |err| DownloadError::Write {
        source: err,
        path: path.to_path_buf(),
    };

    write(path, bytes).map_err(map_err)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        set_permissions(path, Permissions::from_mode(0o755)).map_err(map_err)?;
    }

    Ok(())
}

/// Artifact retrieval error types.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// HTTP client cannot be constructed.
    #[error("failed to build http client")]
    Client(#[source] reqwest::Error),

    /// Request could not be completed.
    #[error("failed to request {url}")]
    Http {
        #[source]
        source: reqwest::Error,
        url: String,
    },

    /// Server answered with a non-success status.
    #[error("request for {url} failed with http status {status}")]
    Status { url: String, status: u16 },

    /// Response body could not be read.
    #[error("failed to read response body of {url}")]
    Read {
        #[source]
        source: std::io::Error,
        url: String,
    },

    /// Style template cannot be set for progress bars.
    #[error(transparent)]
    IndicatifStyleTemplate(#[from] indicatif::style::TemplateError),

    /// Artifact does not match its expected digest.
    #[error("sha256 mismatch for {artifact}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        artifact: String,
        expected: String,
        actual: String,
    },

    /// Detached sum file holds no digest.
    #[error("no sha256 digest found in {url}")]
    MalformedSumFile { url: String },

    /// Tarball cannot be read.
    #[error("failed to read archive")]
    Archive(#[source] std::io::Error),

    /// Tarball has no entry for the executable.
    #[error("archive does not contain {binary:?}")]
    BinaryNotFound { binary: String },

    /// Extracted executable cannot be written.
    #[error("failed to write executable to {:?}", path.display())]
    Write {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = DownloadError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::{write::GzEncoder, Compression};
    use pretty_assertions::assert_eq;
    use simple_test_case::test_case;

    fn tarball(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let encoder = GzEncoder::new(Vec::new(), Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (path, content) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o755);
            header.set_cksum();
            builder.append_data(&mut header, path, *content).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }

    #[test]
    fn bare_binary_is_passed_through() {
        let result = extract_binary(b"\x7fELF", ArchiveKind::Binary, "kubectl").unwrap();
        assert_eq!(result, b"\x7fELF");
    }

    #[test_case("k9s"; "by file name")]
    #[test_case("k9s_0.32.5/bin/k9s"; "by exact path")]
    #[test_case("./k9s_0.32.5/bin/k9s"; "by dotted path")]
    #[test]
    fn tarball_entry_is_extracted(binary: &str) {
        let artifact = tarball(&[
            ("k9s_0.32.5/README.md", b"docs"),
            ("k9s_0.32.5/bin/k9s", b"k9s binary"),
        ]);
        let result = extract_binary(&artifact, ArchiveKind::TarGz, binary).unwrap();
        pretty_assertions::assert_eq!(result, b"k9s binary");
    }

    #[test]
    fn nested_path_does_not_match_by_file_name() {
        let artifact = tarball(&[("other/bin/k9s", b"k9s binary")]);
        let result = extract_binary(&artifact, ArchiveKind::TarGz, "k9s_0.32.5/bin/k9s");
        assert!(matches!(result, Err(DownloadError::BinaryNotFound { .. })));
    }

    #[test]
    fn missing_entry_is_reported() {
        let artifact = tarball(&[("LICENSE", b"MIT")]);
        let result = extract_binary(&artifact, ArchiveKind::TarGz, "cilium");
        assert!(matches!(result, Err(DownloadError::BinaryNotFound { binary }) if binary == "cilium"));
    }

    #[test]
    fn corrupt_tarball_is_reported() {
        let result = extract_binary(b"definitely not gzip", ArchiveKind::TarGz, "cilium");
        assert!(result.is_err());
    }

    #[test]
    fn sha256_digest_is_verified() {
        // Digest of "abc".
        let digest = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";
        assert_eq!(sha256_hex(b"abc"), digest);
        assert!(verify_sha256(b"abc", &digest.to_uppercase(), "abc.txt").is_ok());

        let result = verify_sha256(b"abd", digest, "abc.txt");
        assert!(matches!(result, Err(DownloadError::ChecksumMismatch { .. })));
    }

    #[test_case("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad  cilium.tar.gz\n", true; "digest with file name")]
    #[test_case("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad\n", true; "digest only")]
    #[test_case("<html>not found</html>", false; "html error page")]
    #[test_case("", false; "empty")]
    #[test]
    fn sum_file_is_parsed(content: &str, has_digest: bool) {
        pretty_assertions::assert_eq!(parse_sum_file(content).is_some(), has_digest);
    }

    #[test]
    fn artifact_name_is_last_segment() {
        assert_eq!(artifact_name("https://dl.k8s.io/release/v1.31.0/bin/linux/amd64/kubectl"), "kubectl");
        assert_eq!(artifact_name("https://example.org/dir/"), "dir");
    }

    #[test]
    fn executable_is_written_with_exec_bit() -> anyhow::Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir()?;
        let path = dir.path().join("kubectl");
        write_executable(&path, b"#!/bin/sh\n")?;

        let mode = std::fs::metadata(&path)?.permissions().mode();
        assert_eq!(mode & 0o777, 0o755);

        Ok(())
    }
}

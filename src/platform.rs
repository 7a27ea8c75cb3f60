// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Host platform detection and run preconditions.
//!
//! Rigup only knows how to provision two kinds of hosts: Ubuntu (or another
//! Debian family distribution with apt) and macOS. Before any tool is
//! touched, the host is checked against the platform the user asked for, and
//! the run is refused outright when it was started as root. Package manager
//! steps elevate through sudo on their own, so a root shell would only end up
//! writing root-owned files into the user's home directory.

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    fs::read_to_string,
    str::FromStr,
};
use tracing::{debug, instrument};

/// Platform family that a manifest strategy targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Linux,
    Macos,
}

impl Platform {
    /// Kernel name that must be reported for this platform.
    pub fn kernel(self) -> &'static str {
        match self {
            Self::Linux => "Linux",
            Self::Macos => "Darwin",
        }
    }

    /// Lowercase OS name as used in release artifact names.
    pub fn os(self) -> &'static str {
        match self {
            Self::Linux => "linux",
            Self::Macos => "darwin",
        }
    }
}

impl Display for Platform {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Linux => fmt.write_str("linux"),
            Self::Macos => fmt.write_str("macos"),
        }
    }
}

impl FromStr for Platform {
    type Err = PreflightError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        match data.to_ascii_lowercase().as_str() {
            "linux" | "ubuntu" => Ok(Self::Linux),
            "macos" | "darwin" | "osx" => Ok(Self::Macos),
            _ => Err(PreflightError::UnknownPlatform(data.into())),
        }
    }
}

/// CPU architecture of the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arch {
    X86_64,
    Aarch64,
}

impl Arch {
    /// Detect architecture of current build target.
    ///
    /// # Errors
    ///
    /// - Return [`PreflightError::UnsupportedArch`] for anything other than
    ///   x86_64 or aarch64.
    pub fn detect() -> Result<Self> {
        match std::env::consts::ARCH {
            "x86_64" => Ok(Self::X86_64),
            "aarch64" => Ok(Self::Aarch64),
            other => Err(PreflightError::UnsupportedArch(other.into())),
        }
    }

    /// Go style architecture name, i.e., "amd64" or "arm64".
    pub fn go_name(self) -> &'static str {
        match self {
            Self::X86_64 => "amd64",
            Self::Aarch64 => "arm64",
        }
    }

    /// Release asset style name, i.e., "x86_64" or "arm64".
    ///
    /// Differs from [`Arch::machine`] on Linux, where `uname -m` prints
    /// "aarch64" but most release assets are still labeled "arm64".
    pub fn cpu_name(self) -> &'static str {
        match self {
            Self::X86_64 => "x86_64",
            Self::Aarch64 => "arm64",
        }
    }

    /// Machine hardware name as printed by `uname -m` on target platform.
    pub fn machine(self, platform: Platform) -> &'static str {
        match (self, platform) {
            (Self::X86_64, _) => "x86_64",
            (Self::Aarch64, Platform::Linux) => "aarch64",
            (Self::Aarch64, Platform::Macos) => "arm64",
        }
    }
}

/// Facts about the host that preconditions are checked against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostInfo {
    /// Kernel name, e.g., "Linux" or "Darwin".
    pub kernel: String,

    /// Contents of `/etc/os-release`, if present.
    pub os_release: Option<String>,

    /// Effective user ID of the current process.
    pub euid: u32,
}

impl HostInfo {
    /// Gather host facts for the current process.
    #[instrument(level = "debug")]
    pub fn detect() -> Self {
        let kernel = match std::env::consts::OS {
            "linux" => "Linux".to_string(),
            "macos" => "Darwin".to_string(),
            other => other.to_string(),
        };
        let os_release = read_to_string("/etc/os-release").ok();
        let euid = effective_uid();
        debug!("detected kernel {kernel:?} with euid {euid}");

        Self {
            kernel,
            os_release,
            euid,
        }
    }

    /// Platform family the host belongs to, if any.
    pub fn platform(&self) -> Option<Platform> {
        match self.kernel.as_str() {
            "Linux" => Some(Platform::Linux),
            "Darwin" => Some(Platform::Macos),
            _ => None,
        }
    }

    fn is_debian_family(&self) -> bool {
        let Some(os_release) = &self.os_release else {
            return false;
        };

        os_release.lines().any(|line| {
            let Some((key, value)) = line.split_once('=') else {
                return false;
            };
            let value = value.trim_matches('"');
            match key {
                "ID" => matches!(value, "ubuntu" | "debian"),
                "ID_LIKE" => value
                    .split_whitespace()
                    .any(|id| matches!(id, "ubuntu" | "debian")),
                _ => false,
            }
        })
    }
}

#[cfg(unix)]
fn effective_uid() -> u32 {
    // SAFETY: geteuid has no preconditions and cannot fail.
    unsafe { libc::geteuid() }
}

#[cfg(not(unix))]
fn effective_uid() -> u32 {
    u32::MAX
}

/// Check run preconditions.
///
/// Resolves the platform to provision for, which is the requested one or the
/// host's own. Nothing is installed before this check passes.
///
/// # Errors
///
/// - Return [`PreflightError::RunningAsRoot`] if effective user is root.
/// - Return [`PreflightError::UnsupportedHost`] if host kernel is unknown.
/// - Return [`PreflightError::PlatformMismatch`] if requested platform does
///   not match host kernel.
/// - Return [`PreflightError::NotDebianFamily`] if Linux host lacks an Ubuntu
///   or Debian `/etc/os-release`.
pub fn preflight(requested: Option<Platform>, host: &HostInfo) -> Result<Platform> {
    if host.euid == 0 {
        return Err(PreflightError::RunningAsRoot);
    }

    let detected = host
        .platform()
        .ok_or_else(|| PreflightError::UnsupportedHost(host.kernel.clone()))?;
    let platform = requested.unwrap_or(detected);
    if platform != detected {
        return Err(PreflightError::PlatformMismatch {
            platform,
            kernel: host.kernel.clone(),
        });
    }

    if platform == Platform::Linux && !host.is_debian_family() {
        return Err(PreflightError::NotDebianFamily);
    }

    Ok(platform)
}

/// Precondition violations.
#[derive(Debug, thiserror::Error)]
pub enum PreflightError {
    /// Run was started with root privileges.
    #[error("do not run rigup as root, it elevates through sudo when needed")]
    RunningAsRoot,

    /// Requested platform does not match host kernel.
    #[error("refusing to provision for {platform}: host kernel is {kernel:?}, expected {:?}", .platform.kernel())]
    PlatformMismatch { platform: Platform, kernel: String },

    /// Host kernel is neither Linux nor Darwin.
    #[error("unsupported host kernel {0:?}")]
    UnsupportedHost(String),

    /// Linux host is not an apt based distribution.
    #[error("linux provisioning requires Ubuntu or another Debian family distribution")]
    NotDebianFamily,

    /// Platform name cannot be parsed.
    #[error("unknown platform {0:?}, expected linux or macos")]
    UnknownPlatform(String),

    /// Host architecture has no release artifacts.
    #[error("unsupported architecture {0:?}")]
    UnsupportedArch(String),
}

/// Friendly result alias :3
pub type Result<T, E = PreflightError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use simple_test_case::test_case;

    const UBUNTU: &str = indoc! {r#"
        NAME="Ubuntu"
        VERSION_ID="24.04"
        ID=ubuntu
        ID_LIKE=debian
    "#};

    const POP_OS: &str = indoc! {r#"
        NAME="Pop!_OS"
        ID=pop
        ID_LIKE="ubuntu debian"
    "#};

    const FEDORA: &str = indoc! {r#"
        NAME="Fedora Linux"
        ID=fedora
    "#};

    fn host(kernel: &str, os_release: Option<&str>, euid: u32) -> HostInfo {
        HostInfo {
            kernel: kernel.into(),
            os_release: os_release.map(Into::into),
            euid,
        }
    }

    #[test]
    fn root_is_refused_before_anything_else() {
        let result = preflight(None, &host("Darwin", None, 0));
        assert!(matches!(result, Err(PreflightError::RunningAsRoot)));
    }

    #[test]
    fn macos_requires_darwin_kernel() {
        let result = preflight(Some(Platform::Macos), &host("Linux", Some(UBUNTU), 1000));
        assert!(matches!(
            result,
            Err(PreflightError::PlatformMismatch { platform: Platform::Macos, .. })
        ));

        let result = preflight(Some(Platform::Macos), &host("Darwin", None, 501));
        assert_eq!(result.ok(), Some(Platform::Macos));
    }

    #[test_case(UBUNTU; "ubuntu")]
    #[test_case(POP_OS; "ubuntu derivative")]
    #[test]
    fn debian_family_linux_passes(os_release: &str) {
        let result = preflight(None, &host("Linux", Some(os_release), 1000));
        pretty_assertions::assert_eq!(result.ok(), Some(Platform::Linux));
    }

    #[test]
    fn non_debian_linux_is_refused() {
        let result = preflight(None, &host("Linux", Some(FEDORA), 1000));
        assert!(matches!(result, Err(PreflightError::NotDebianFamily)));

        let result = preflight(None, &host("Linux", None, 1000));
        assert!(matches!(result, Err(PreflightError::NotDebianFamily)));
    }

    #[test]
    fn unknown_kernel_is_refused() {
        let result = preflight(None, &host("FreeBSD", None, 1000));
        assert!(matches!(result, Err(PreflightError::UnsupportedHost(_))));
    }

    #[test_case("linux", Platform::Linux; "linux")]
    #[test_case("Ubuntu", Platform::Linux; "ubuntu alias")]
    #[test_case("macOS", Platform::Macos; "macos")]
    #[test_case("darwin", Platform::Macos; "darwin alias")]
    #[test]
    fn platform_names_parse(name: &str, expect: Platform) {
        pretty_assertions::assert_eq!(name.parse::<Platform>().unwrap(), expect);
    }

    #[test]
    fn machine_names_follow_uname() {
        assert_eq!(Arch::Aarch64.machine(Platform::Linux), "aarch64");
        assert_eq!(Arch::Aarch64.machine(Platform::Macos), "arm64");
        assert_eq!(Arch::X86_64.go_name(), "amd64");
        assert_eq!(Arch::Aarch64.cpu_name(), "arm64");
        assert_eq!(Arch::X86_64.cpu_name(), "x86_64");
    }
}

// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout of the tool manifest that rigup uses to simplify the
//! process of serialization and deserialization. File I/O is left to the
//! caller to figure out.
//!
//! # Tool Manifest
//!
//! The __tool manifest__ is the one place where every tool rigup manages is
//! described, along with the version it is pinned to. Each entry is a
//! __tool descriptor__: the executable name to probe for, the pinned version,
//! the thematic group it belongs to, and the install strategy to use on each
//! platform. Keeping every pin in one manifest means the Linux and macOS
//! installs of a tool can never drift apart.

use crate::platform::Platform;

use serde::{Deserialize, Serialize};
use std::{
    collections::HashSet,
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    path::PathBuf,
    str::FromStr,
};
use tracing::warn;

/// Manifest embedded into the binary.
pub const DEFAULT_MANIFEST: &str = include_str!("../manifest/tools.toml");

/// Tool manifest layout.
///
/// # General Layout
///
/// A tool manifest is composed of two basic parts: settings and tools. The
/// settings section defines where tools are placed and how the run is
/// ordered. The tools section lists every tool descriptor.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct Manifest {
    /// Settings for the provisioning run.
    #[serde(default)]
    pub settings: Settings,

    /// Tool descriptor listing.
    #[serde(rename = "tool", default)]
    pub tools: Vec<ToolDescriptor>,
}

impl Manifest {
    /// Parse the manifest embedded into the binary.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError`] if the embedded manifest is malformed.
    pub fn embedded() -> Result<Self> {
        DEFAULT_MANIFEST.parse()
    }

    /// List tool descriptors in run order.
    ///
    /// Groups listed in the settings come first in that order, then any
    /// remaining groups in order of first appearance. Within a group,
    /// manifest order is kept. Duplicate tool names are dropped, keeping the
    /// first occurrence.
    pub fn ordered_tools(&self) -> Vec<&ToolDescriptor> {
        let mut seen = HashSet::new();
        let mut unique = Vec::new();
        for tool in &self.tools {
            if seen.insert(tool.name.as_str()) {
                unique.push(tool);
            } else {
                warn!("drop duplicate entry for tool {:?}", tool.name);
            }
        }

        let mut groups: Vec<&str> = self.settings.groups.iter().map(String::as_str).collect();
        for tool in &unique {
            if !groups.contains(&tool.group.as_str()) {
                groups.push(tool.group.as_str());
            }
        }

        groups
            .into_iter()
            .flat_map(|group| unique.iter().copied().filter(move |tool| tool.group == group))
            .collect()
    }

    /// List tool descriptors of target groups in run order.
    ///
    /// An empty group listing selects every tool.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::NoToolsInGroups`] if groups are given but none
    ///   of them has a tool.
    pub fn tools_in_groups(&self, groups: &[String]) -> Result<Vec<&ToolDescriptor>> {
        let tools: Vec<&ToolDescriptor> = self
            .ordered_tools()
            .into_iter()
            .filter(|tool| groups.is_empty() || groups.contains(&tool.group))
            .collect();

        if tools.is_empty() && !groups.is_empty() {
            return Err(ConfigError::NoToolsInGroups(groups.join(", ")));
        }

        Ok(tools)
    }
}

impl FromStr for Manifest {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut manifest: Manifest = toml::de::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Perform shell expansion on path fields.
        manifest.settings.bin_dir = expand_path(&manifest.settings.bin_dir)?;
        if let Some(profile) = &manifest.settings.profile {
            manifest.settings.profile = Some(expand_path(profile)?);
        }
        manifest.settings.search_paths = manifest
            .settings
            .search_paths
            .iter()
            .map(|path| expand_path(path))
            .collect::<Result<_>>()?;

        // INVARIANT: An empty line or pattern would match any profile.
        for tool in &manifest.tools {
            let blank = tool.profile.iter().any(|profile| {
                profile.line.trim().is_empty()
                    || profile.pattern.as_deref().is_some_and(|p| p.trim().is_empty())
            });
            if blank {
                return Err(ConfigError::BlankProfileLine {
                    tool: tool.name.clone(),
                });
            }
        }

        Ok(manifest)
    }
}

impl Display for Manifest {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

fn expand_path(path: &std::path::Path) -> Result<PathBuf> {
    Ok(PathBuf::from(
        shellexpand::full(path.to_string_lossy().as_ref())
            .map_err(ConfigError::ShellExpansion)?
            .into_owned(),
    ))
}

/// Provisioning settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct Settings {
    /// Directory that downloaded binaries are installed into.
    #[serde(default = "default_bin_dir")]
    pub bin_dir: PathBuf,

    /// Use sudo for system package installs and writes into the binary
    /// directory.
    #[serde(default = "default_elevate")]
    pub elevate: bool,

    /// Shell startup file to append profile lines to. Derived from `$SHELL`
    /// when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<PathBuf>,

    /// Order in which tool groups are provisioned.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,

    /// Upper bound for a single download.
    #[serde(default = "default_download_timeout")]
    pub download_timeout_secs: u64,

    /// User tool directories appended to the search path, e.g.,
    /// `~/.cargo/bin`. Toolchains installed earlier in a run put their
    /// executables there before any shell startup file is re-read.
    #[serde(default = "default_search_paths", skip_serializing_if = "Vec::is_empty")]
    pub search_paths: Vec<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bin_dir: default_bin_dir(),
            elevate: default_elevate(),
            profile: None,
            groups: Vec::new(),
            download_timeout_secs: default_download_timeout(),
            search_paths: default_search_paths(),
        }
    }
}

fn default_bin_dir() -> PathBuf {
    PathBuf::from("/usr/local/bin")
}

fn default_elevate() -> bool {
    true
}

fn default_download_timeout() -> u64 {
    300
}

fn default_search_paths() -> Vec<PathBuf> {
    ["~/.local/bin", "~/.cargo/bin", "~/go/bin", "~/.local/share/mise/shims"]
        .into_iter()
        .map(|path| PathBuf::from(shellexpand::tilde(path).as_ref()))
        .collect()
}

fn default_group() -> String {
    "misc".into()
}

/// Tool descriptor.
///
/// Describes one executable: what it is called, what version it is pinned
/// to, and how to install it on each platform.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct ToolDescriptor {
    /// Executable name, used for display and, by default, for probing.
    pub name: String,

    /// Pinned version.
    pub version: String,

    /// Thematic group the tool is provisioned in.
    #[serde(default = "default_group")]
    pub group: String,

    /// Executable to probe for when it differs from the tool name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probe: Option<String>,

    /// Install strategy used on any platform without an override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install: Option<InstallStrategy>,

    /// Install strategy override for Linux.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linux: Option<InstallStrategy>,

    /// Install strategy override for macOS.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub macos: Option<InstallStrategy>,

    /// Lines to ensure in the user's shell startup file.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub profile: Vec<ProfileLine>,

    /// Follow-up commands to run after a fresh install.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub after: Vec<AfterCommand>,
}

impl ToolDescriptor {
    /// Executable name to probe for.
    pub fn probe_name(&self) -> &str {
        self.probe.as_deref().unwrap_or(&self.name)
    }

    /// Install strategy for target platform, if any.
    pub fn strategy_for(&self, platform: Platform) -> Option<&InstallStrategy> {
        let specific = match platform {
            Platform::Linux => self.linux.as_ref(),
            Platform::Macos => self.macos.as_ref(),
        };

        specific.or(self.install.as_ref())
    }
}

/// How a tool gets installed.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(tag = "strategy", rename_all = "kebab-case")]
pub enum InstallStrategy {
    /// System package manager, i.e., apt on Linux and brew on macOS.
    Package(PackageSpec),

    /// Direct download of a release binary or archive.
    Download(DownloadSpec),

    /// Remote installer script run through a shell.
    Script(ScriptSpec),

    /// Language ecosystem package manager.
    Language(LanguageSpec),
}

impl InstallStrategy {
    /// Short name of the strategy.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Package(_) => "package",
            Self::Download(_) => "download",
            Self::Script(_) => "script",
            Self::Language(_) => "language",
        }
    }
}

/// System package manager install.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct PackageSpec {
    /// Package name when it differs from the tool name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,

    /// Install as a Homebrew cask.
    #[serde(default, skip_serializing_if = "is_false")]
    pub cask: bool,
}

/// Direct download install.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct DownloadSpec {
    /// URL template of the artifact.
    pub url: String,

    /// Artifact layout.
    #[serde(default)]
    pub archive: ArchiveKind,

    /// Path template of the executable inside the archive.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binary: Option<String>,

    /// Expected SHA-256 hex digest of the artifact.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,

    /// URL template of a detached SHA-256 sum file for the artifact.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256_url: Option<String>,
}

/// Layout of a downloaded artifact.
#[derive(Default, Debug, PartialEq, Eq, Clone, Copy, Deserialize, Serialize)]
pub enum ArchiveKind {
    /// The artifact is the executable itself.
    #[default]
    #[serde(rename = "binary")]
    Binary,

    /// Gzip compressed tarball containing the executable.
    #[serde(rename = "tar.gz")]
    TarGz,
}

/// Remote installer script.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct ScriptSpec {
    /// URL template of the installer.
    pub url: String,

    /// Interpreter to run the installer with.
    #[serde(default = "default_shell")]
    pub shell: String,

    /// Extra arguments passed to the installer.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,

    /// Run the installer through sudo.
    #[serde(default, skip_serializing_if = "is_false")]
    pub elevate: bool,

    /// Expected SHA-256 hex digest of the installer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

fn default_shell() -> String {
    "sh".into()
}

/// Language ecosystem install.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct LanguageSpec {
    /// Ecosystem package manager to use.
    pub ecosystem: Ecosystem,

    /// Package name when it differs from the tool name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,
}

/// Supported language ecosystems.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Ecosystem {
    /// `pip3 install --user`, refused by externally managed Pythons.
    Pip,

    /// Isolated Python applications through pipx.
    Pipx,

    Npm,
    Cargo,
    Go,

    /// Runtimes managed by mise, e.g., node.
    Mise,
}

/// Line to ensure in the user's shell startup file.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct ProfileLine {
    /// Line of shell code to append.
    pub line: String,

    /// Substring whose presence means the line is already there. Defaults to
    /// the line itself. Must not be blank.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

impl ProfileLine {
    /// Render line and search pattern for target shell.
    ///
    /// Replaces each `{shell}` with the shell name.
    pub fn render(&self, shell: &str) -> (String, String) {
        let line = self.line.replace("{shell}", shell);
        let pattern = match &self.pattern {
            Some(pattern) => pattern.replace("{shell}", shell),
            None => line.clone(),
        };

        (line, pattern)
    }
}

/// Follow-up command run after a fresh install.
///
/// Failure of a follow-up command is only reported, it never aborts the run.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct AfterCommand {
    /// Program followed by its arguments. Each `{shell}` is replaced with the
    /// shell name.
    pub command: Vec<String>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Render a `{placeholder}` template.
///
/// Every placeholder must be one of the given variables.
///
/// # Errors
///
/// - Return [`ConfigError::UnknownPlaceholder`] if a placeholder has no
///   matching variable.
/// - Return [`ConfigError::UnclosedPlaceholder`] if a `{` is never closed.
pub fn render_template(template: &str, vars: &[(&str, &str)]) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let end = after
            .find('}')
            .ok_or_else(|| ConfigError::UnclosedPlaceholder {
                template: template.into(),
            })?;
        let key = &after[..end];
        let value = vars
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, value)| *value)
            .ok_or_else(|| ConfigError::UnknownPlaceholder {
                placeholder: key.into(),
                template: template.into(),
            })?;
        out.push_str(value);
        rest = &after[end + 1..];
    }
    out.push_str(rest);

    Ok(out)
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),

    /// Template refers to a placeholder that does not exist.
    #[error("unknown placeholder {{{placeholder}}} in {template:?}")]
    UnknownPlaceholder { placeholder: String, template: String },

    /// Template opens a placeholder without closing it.
    #[error("unclosed placeholder in {template:?}")]
    UnclosedPlaceholder { template: String },

    /// Profile line or its pattern is blank.
    #[error("tool {tool:?} has a blank shell profile line or pattern")]
    BlankProfileLine { tool: String },

    /// Group selection matches no tool.
    #[error("no tools in groups {0}")]
    NoToolsInGroups(String),
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;

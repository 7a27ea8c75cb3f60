// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Provisioning driver.
//!
//! The driver walks the tool manifest in group order and applies one rule to
//! every tool: __probe, then install__. A tool that already resolves on the
//! search path is never reinstalled, which makes running the driver again
//! after any kind of interruption safe.
//!
//! # Failure Semantics
//!
//! Provisioning is fail-fast. The first tool whose install fails stops the
//! run, and no later tool is touched. Nothing is rolled back; rerunning the
//! driver picks up where it stopped, because every finished tool will probe
//! as present. Follow-up commands of a tool, e.g., installing shell
//! completions, are the exception: they are soft steps that only warn.
//!
//! # Shell Profile Lines
//!
//! Profile lines of a tool are ensured whenever the tool is present after its
//! step, whether it was just installed or already there. Each line is an
//! idempotent append, so this never duplicates anything. A dry run reports
//! the lines of missing tools as well.
//!
//! # Search Path
//!
//! Toolchains installed earlier in a run usually land in per-user
//! directories that the invoking shell has not picked up yet, e.g.,
//! `~/.cargo/bin`. The `search_paths` setting is appended to the search path
//! used for lookups and to the `PATH` of every command the run spawns.

pub mod download;
pub mod install;
pub mod report;
pub mod syscall;

use crate::{
    config::{Settings, ToolDescriptor},
    platform::{Arch, Platform},
    probe::{Probe, ProbeOutcome},
    profile::{ProfileChange, ProfileError, ShellProfile},
    provision::{
        download::{Fetcher, HttpFetcher},
        install::{InstallError, Installer},
        syscall::{CommandRunner, SystemRunner},
    },
};

use std::path::PathBuf;
use tracing::{error, info, instrument, warn};

/// What happened to a single tool during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolOutcome {
    /// Tool was already on the search path.
    AlreadyInstalled(PathBuf),

    /// Tool was installed. Holds the resolved path if the tool probes as
    /// present afterwards.
    Installed(Option<PathBuf>),

    /// Tool is missing and would be installed, but this is a dry run.
    Planned,

    /// Manifest has no install strategy for the host platform.
    Unsupported,
}

/// Result of a provisioning run.
///
/// Holds the outcome of every tool that was processed, plus the error that
/// aborted the run, if any.
#[derive(Debug)]
pub struct ProvisionRun {
    /// Outcomes in processing order.
    pub outcomes: Vec<(String, ToolOutcome)>,

    /// Profile lines appended, or that would be appended in a dry run, as
    /// pairs of tool name and rendered line.
    pub profile_lines: Vec<(String, String)>,

    /// Error that stopped the run early.
    pub aborted: Option<ProvisionError>,
}

impl ProvisionRun {
    /// Number of tools that were freshly installed.
    pub fn installed_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| matches!(outcome, ToolOutcome::Installed(_)))
            .count()
    }

    /// Turn run into a result that fails if the run aborted.
    ///
    /// # Errors
    ///
    /// - Return [`ProvisionError`] that aborted the run.
    pub fn into_result(self) -> Result<Vec<(String, ToolOutcome)>> {
        match self.aborted {
            Some(error) => Err(error),
            None => Ok(self.outcomes),
        }
    }
}

/// Provision tools on the host.
#[derive(Debug)]
pub struct Provisioner<R = SystemRunner, F = HttpFetcher>
where
    R: CommandRunner,
    F: Fetcher,
{
    platform: Platform,
    arch: Arch,
    settings: Settings,
    runner: R,
    fetcher: F,
    probe: Probe,
    profile: ShellProfile,
    shell: String,
    dry_run: bool,
}

impl<R, F> Provisioner<R, F>
where
    R: CommandRunner,
    F: Fetcher,
{
    /// Construct new provisioner.
    ///
    /// Probes the process `$PATH` extended by the `search_paths` setting, and
    /// appends profile lines to `profile`, rendering `{shell}` as `shell`.
    pub fn new(
        platform: Platform,
        arch: Arch,
        settings: Settings,
        runner: R,
        fetcher: F,
        profile: ShellProfile,
        shell: impl Into<String>,
    ) -> Self {
        let probe = Probe::new().extended(&settings.search_paths);
        Self {
            platform,
            arch,
            settings,
            runner,
            fetcher,
            probe,
            profile,
            shell: shell.into(),
            dry_run: false,
        }
    }

    /// Use target probe instead of the process `$PATH`.
    ///
    /// The `search_paths` setting still extends it.
    pub fn with_probe(mut self, probe: Probe) -> Self {
        self.probe = probe.extended(&self.settings.search_paths);
        self
    }

    /// Only log what would be installed.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Probe used by this provisioner.
    pub fn probe(&self) -> &Probe {
        &self.probe
    }

    /// Command runner used by this provisioner.
    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Provision tools in the given order.
    ///
    /// Stops at the first tool that fails to install. Never panics, and never
    /// returns early without the outcomes gathered so far.
    #[instrument(skip(self, tools), level = "debug")]
    pub fn provision<'t>(
        &self,
        tools: impl IntoIterator<Item = &'t ToolDescriptor>,
    ) -> ProvisionRun {
        let installer = Installer::new(
            &self.runner,
            &self.fetcher,
            &self.settings,
            self.platform,
            self.arch,
        )
        .with_search_path(self.probe.search_path());

        let mut outcomes = Vec::new();
        let mut profile_lines = Vec::new();
        let mut group: Option<&str> = None;
        for tool in tools {
            if group != Some(tool.group.as_str()) {
                info!("provision group {}", tool.group);
                group = Some(tool.group.as_str());
            }

            match self.provision_tool(&installer, tool, &mut profile_lines) {
                Ok(outcome) => outcomes.push((tool.name.clone(), outcome)),
                Err(error) => {
                    error!("provisioning stopped at {}", tool.name);
                    return ProvisionRun {
                        outcomes,
                        profile_lines,
                        aborted: Some(error),
                    };
                }
            }
        }

        ProvisionRun {
            outcomes,
            profile_lines,
            aborted: None,
        }
    }

    fn provision_tool(
        &self,
        installer: &Installer<'_, R, F>,
        tool: &ToolDescriptor,
        profile_lines: &mut Vec<(String, String)>,
    ) -> Result<ToolOutcome> {
        let Some(strategy) = tool.strategy_for(self.platform) else {
            warn!("no install strategy for {} on {}", tool.name, self.platform);
            return Ok(ToolOutcome::Unsupported);
        };

        let outcome = match self.probe.probe(tool.probe_name()) {
            ProbeOutcome::Found(path) => ToolOutcome::AlreadyInstalled(path),
            ProbeOutcome::Missing if self.dry_run => {
                info!(
                    "would install {} {} via {}",
                    tool.name,
                    tool.version,
                    strategy.kind()
                );
                ToolOutcome::Planned
            }
            ProbeOutcome::Missing => {
                installer
                    .install(tool, strategy)
                    .map_err(|source| ProvisionError::Install {
                        tool: tool.name.clone(),
                        source,
                    })?;
                installer.run_after(tool, &self.shell);

                let path = self.probe.locate(tool.probe_name()).path().map(PathBuf::from);
                if path.is_none() {
                    warn!(
                        "{} installed but not on search path yet, a new shell may be needed",
                        tool.name
                    );
                }
                ToolOutcome::Installed(path)
            }
        };

        for line in self.ensure_profile_lines(tool)? {
            profile_lines.push((tool.name.clone(), line));
        }

        Ok(outcome)
    }

    /// Ensure profile lines of tool, returning every line that was appended
    /// or would be appended.
    fn ensure_profile_lines(&self, tool: &ToolDescriptor) -> Result<Vec<String>> {
        let mut changed = Vec::new();
        for profile_line in &tool.profile {
            let (line, pattern) = profile_line.render(&self.shell);
            if self.dry_run {
                let present = self.profile.contains(&pattern).map_err(|source| {
                    ProvisionError::Profile {
                        tool: tool.name.clone(),
                        source,
                    }
                })?;
                if !present {
                    info!("would append {line:?} to {}", self.profile.path().display());
                    changed.push(line);
                }
                continue;
            }

            let change = self
                .profile
                .ensure_line(&line, &pattern)
                .map_err(|source| ProvisionError::Profile {
                    tool: tool.name.clone(),
                    source,
                })?;

            if change == ProfileChange::Appended {
                info!("{} hooked into {}", tool.name, self.profile.path().display());
                changed.push(line);
            }
        }

        Ok(changed)
    }
}

/// Provisioning error types.
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    /// Tool installation fails.
    #[error("failed to install {tool}")]
    Install {
        tool: String,
        #[source]
        source: InstallError,
    },

    /// Shell profile cannot be updated for tool.
    #[error("failed to update shell profile for {tool}")]
    Profile {
        tool: String,
        #[source]
        source: ProfileError,
    },
}

/// Friendly result alias :3
pub type Result<T, E = ProvisionError> = std::result::Result<T, E>;

// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Tool installation strategies.
//!
//! Given a tool descriptor and the install strategy that applies to the host
//! platform, make the tool's executable resolvable on the search path. Each
//! strategy is a thin translation into commands and downloads:
//!
//! - __package__: `apt-get install` on Linux, `brew install` on macOS.
//! - __download__: fetch a release artifact, optionally verify its digest,
//!   extract the executable, and place it into the binary directory.
//! - __script__: fetch a remote installer and run it through a shell.
//! - __language__: pip, pipx, npm, cargo, go, or mise installs of global
//!   tooling.
//!
//! Any failure of an underlying command or download is returned as an error.
//! Deciding what to do about it is left to the caller.

use crate::{
    config::{
        render_template, AfterCommand, ConfigError, DownloadSpec, Ecosystem, InstallStrategy,
        LanguageSpec, PackageSpec, ScriptSpec, Settings, ToolDescriptor,
    },
    platform::{Arch, Platform},
    provision::{
        download::{
            artifact_name, extract_binary, parse_sum_file, verify_sha256, write_executable,
            DownloadError, Fetcher,
        },
        syscall::{CommandRunner, CommandSpec, SyscallError},
    },
};

use std::{
    cell::Cell,
    ffi::{OsStr, OsString},
    fs::{copy, create_dir_all},
    path::PathBuf,
};
use tracing::{debug, info, instrument, warn};

/// Install tools through a command runner and an artifact fetcher.
#[derive(Debug)]
pub struct Installer<'a, R, F>
where
    R: CommandRunner,
    F: Fetcher,
{
    runner: &'a R,
    fetcher: &'a F,
    settings: &'a Settings,
    platform: Platform,
    arch: Arch,
    search_path: Option<OsString>,
    apt_updated: Cell<bool>,
}

impl<'a, R, F> Installer<'a, R, F>
where
    R: CommandRunner,
    F: Fetcher,
{
    /// Construct new installer.
    pub fn new(
        runner: &'a R,
        fetcher: &'a F,
        settings: &'a Settings,
        platform: Platform,
        arch: Arch,
    ) -> Self {
        Self {
            runner,
            fetcher,
            settings,
            platform,
            arch,
            search_path: None,
            apt_updated: Cell::new(false),
        }
    }

    /// Run every command with target `PATH`.
    pub fn with_search_path(mut self, search_path: Option<&OsStr>) -> Self {
        self.search_path = search_path.map(OsStr::to_os_string);
        self
    }

    /// Install tool with target strategy.
    ///
    /// # Errors
    ///
    /// - Return [`InstallError`] if any command, download, or file operation
    ///   of the strategy fails.
    #[instrument(skip(self, tool, strategy), fields(tool = %tool.name), level = "debug")]
    pub fn install(&self, tool: &ToolDescriptor, strategy: &InstallStrategy) -> Result<()> {
        info!(
            "install {} {} via {}",
            tool.name,
            tool.version,
            strategy.kind()
        );
        match strategy {
            InstallStrategy::Package(spec) => self.install_package(tool, spec),
            InstallStrategy::Download(spec) => self.install_download(tool, spec),
            InstallStrategy::Script(spec) => self.install_script(tool, spec),
            InstallStrategy::Language(spec) => self.install_language(tool, spec),
        }
    }

    /// Run follow-up commands of freshly installed tool.
    ///
    /// Follow-up commands are soft steps: each failure is logged as a warning
    /// and the remaining commands still run. Returns number of failures.
    pub fn run_after(&self, tool: &ToolDescriptor, shell: &str) -> usize {
        let mut failures = 0;
        for after in &tool.after {
            let Some(command) = after_command(after, shell) else {
                warn!("skip empty follow-up command of {}", tool.name);
                continue;
            };

            if let Err(error) = self.run(command) {
                warn!("follow-up step of {} failed, continuing: {error}", tool.name);
                failures += 1;
            }
        }

        failures
    }

    fn install_package(&self, tool: &ToolDescriptor, spec: &PackageSpec) -> Result<()> {
        let package = spec.package.as_deref().unwrap_or(&tool.name);
        match self.platform {
            Platform::Linux => {
                if !self.apt_updated.get() {
                    self.run(
                        CommandSpec::new("apt-get")
                            .arg("update")
                            .elevated(self.settings.elevate),
                    )?;
                    self.apt_updated.set(true);
                }

                self.run(
                    CommandSpec::new("apt-get")
                        .args(["install", "-y", package])
                        .elevated(self.settings.elevate),
                )?;
            }
            Platform::Macos => {
                let mut command = CommandSpec::new("brew").arg("install");
                if spec.cask {
                    command = command.arg("--cask");
                }
                self.run(command.arg(package))?;
            }
        }

        Ok(())
    }

    fn install_download(&self, tool: &ToolDescriptor, spec: &DownloadSpec) -> Result<()> {
        let url = self.render(tool, &spec.url)?;
        let artifact = self.fetcher.fetch(&url)?;

        if let Some(expected) = &spec.sha256 {
            verify_sha256(&artifact, expected, artifact_name(&url))?;
        } else if let Some(sum_url) = &spec.sha256_url {
            let sum_url = self.render(tool, sum_url)?;
            let sum_file = String::from_utf8_lossy(&self.fetcher.fetch(&sum_url)?).into_owned();
            let expected = parse_sum_file(&sum_file)
                .ok_or_else(|| DownloadError::MalformedSumFile { url: sum_url.clone() })?;
            verify_sha256(&artifact, expected, artifact_name(&url))?;
        } else {
            debug!("no checksum configured for {}", tool.name);
        }

        let binary = match &spec.binary {
            Some(binary) => self.render(tool, binary)?,
            None => tool.name.clone(),
        };
        let executable = extract_binary(&artifact, spec.archive, &binary)?;

        // INVARIANT: Temporary artifacts are removed once the scratch directory drops.
        let scratch = tempfile::tempdir().map_err(InstallError::Scratch)?;
        let staged = scratch.path().join(&tool.name);
        write_executable(&staged, &executable)?;
        self.place_executable(tool, &staged)?;

        Ok(())
    }

    fn place_executable(&self, tool: &ToolDescriptor, staged: &std::path::Path) -> Result<()> {
        let bin_dir = &self.settings.bin_dir;
        let dest = bin_dir.join(&tool.name);
        info!("place {} into {}", tool.name, bin_dir.display());

        if self.settings.elevate {
            self.run(
                CommandSpec::new("install")
                    .args(["-m", "0755"])
                    .arg(staged)
                    .arg(&dest)
                    .elevated(true),
            )?;
            return Ok(());
        }

        let map_err = |err| InstallError::Place {
            source: err,
            path: dest.clone(),
        };
        create_dir_all(bin_dir).map_err(map_err)?;
        copy(staged, &dest).map_err(map_err)?;

        Ok(())
    }

    fn install_script(&self, tool: &ToolDescriptor, spec: &ScriptSpec) -> Result<()> {
        let url = self.render(tool, &spec.url)?;
        let script = self.fetcher.fetch(&url)?;
        match &spec.sha256 {
            Some(expected) => verify_sha256(&script, expected, artifact_name(&url))?,
            None => warn!("running {} installer from {url} without verification", tool.name),
        }

        let scratch = tempfile::tempdir().map_err(InstallError::Scratch)?;
        let staged = scratch.path().join("install.sh");
        write_executable(&staged, &script)?;

        let args = spec
            .args
            .iter()
            .map(|arg| self.render(tool, arg))
            .collect::<Result<Vec<_>>>()?;
        self.run(
            CommandSpec::new(&spec.shell)
                .arg(&staged)
                .args(args)
                .elevated(spec.elevate),
        )?;

        Ok(())
    }

    fn install_language(&self, tool: &ToolDescriptor, spec: &LanguageSpec) -> Result<()> {
        let package = spec.package.as_deref().unwrap_or(&tool.name);
        let version = Some(tool.version.as_str()).filter(|version| *version != "latest");

        let command = match (spec.ecosystem, version) {
            (Ecosystem::Pip, Some(version)) => CommandSpec::new("pip3")
                .args(["install", "--user"])
                .arg(format!("{package}=={version}")),
            (Ecosystem::Pip, None) => CommandSpec::new("pip3").args(["install", "--user", package]),
            (Ecosystem::Pipx, Some(version)) => CommandSpec::new("pipx")
                .arg("install")
                .arg(format!("{package}=={version}")),
            (Ecosystem::Pipx, None) => CommandSpec::new("pipx").args(["install", package]),
            (Ecosystem::Npm, Some(version)) => CommandSpec::new("npm")
                .args(["install", "-g"])
                .arg(format!("{package}@{version}")),
            (Ecosystem::Npm, None) => CommandSpec::new("npm").args(["install", "-g", package]),
            (Ecosystem::Cargo, Some(version)) => CommandSpec::new("cargo")
                .args(["install", package, "--locked", "--version", version]),
            (Ecosystem::Cargo, None) => {
                CommandSpec::new("cargo").args(["install", package, "--locked"])
            }
            (Ecosystem::Go, Some(version)) => CommandSpec::new("go")
                .arg("install")
                .arg(format!("{package}@v{}", version.trim_start_matches('v'))),
            (Ecosystem::Go, None) => CommandSpec::new("go")
                .arg("install")
                .arg(format!("{package}@latest")),
            (Ecosystem::Mise, version) => CommandSpec::new("mise")
                .args(["use", "--global"])
                .arg(format!("{package}@{}", version.unwrap_or("latest"))),
        };
        self.run(command)?;

        Ok(())
    }

    fn run(&self, command: CommandSpec) -> Result<(), SyscallError> {
        let command = match &self.search_path {
            Some(search_path) => command.env("PATH", search_path),
            None => command,
        };

        self.runner.run(&command)
    }

    fn render(&self, tool: &ToolDescriptor, template: &str) -> Result<String> {
        let vars = [
            ("name", tool.name.as_str()),
            ("version", tool.version.as_str()),
            ("os", self.platform.os()),
            ("kernel", self.platform.kernel()),
            ("arch", self.arch.go_name()),
            ("machine", self.arch.machine(self.platform)),
            ("cpu", self.arch.cpu_name()),
        ];

        Ok(render_template(template, &vars)?)
    }
}

fn after_command(after: &AfterCommand, shell: &str) -> Option<CommandSpec> {
    let (program, args) = after.command.split_first()?;
    Some(
        CommandSpec::new(program.replace("{shell}", shell))
            .args(args.iter().map(|arg| arg.replace("{shell}", shell))),
    )
}

/// Tool installation error types.
#[derive(Debug, thiserror::Error)]
pub enum InstallError {
    /// Template in descriptor cannot be rendered.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Artifact retrieval fails.
    #[error(transparent)]
    Download(#[from] DownloadError),

    /// Underlying command fails.
    #[error(transparent)]
    Syscall(#[from] SyscallError),

    /// Scratch directory for artifacts cannot be created.
    #[error("failed to create scratch directory")]
    Scratch(#[source] std::io::Error),

    /// Executable cannot be placed into binary directory.
    #[error("failed to place executable at {:?}", path.display())]
    Place {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = InstallError> = std::result::Result<T, E>;

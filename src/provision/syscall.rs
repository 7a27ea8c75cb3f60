// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! External command execution.
//!
//! Every package manager, installer script, and language tool is driven as an
//! external process. Commands are described as plain data first through
//! [`CommandSpec`], then handed to a [`CommandRunner`]. The indirection keeps
//! the installers free of process handling, and lets a run be recorded instead
//! of executed.

use std::{
    ffi::{OsStr, OsString},
    fmt::{Display, Formatter, Result as FmtResult},
    process::Command,
};
use tracing::{debug, instrument};

/// External command described as data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Program to execute.
    pub program: OsString,

    /// Arguments passed to program.
    pub args: Vec<OsString>,

    /// Environment variables set on top of the inherited environment.
    pub env: Vec<(OsString, OsString)>,
}

impl CommandSpec {
    /// Construct new command without arguments.
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append a listing of arguments.
    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<OsString>>) -> Self {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set environment variable for the command.
    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Look up environment variable set for the command.
    pub fn env_var(&self, key: &str) -> Option<&OsStr> {
        self.env
            .iter()
            .rev()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_os_str())
    }

    /// Run command through sudo if `elevate` is set.
    pub fn elevated(self, elevate: bool) -> Self {
        if !elevate {
            return self;
        }

        let mut args = Vec::with_capacity(self.args.len() + 1);
        args.push(self.program);
        args.extend(self.args);
        Self {
            program: "sudo".into(),
            args,
            env: self.env,
        }
    }

    /// Program name as lossy UTF-8.
    pub fn program_name(&self) -> String {
        self.program.to_string_lossy().into_owned()
    }
}

impl Display for CommandSpec {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(&self.program.to_string_lossy())?;
        for arg in &self.args {
            write!(fmt, " {}", arg.to_string_lossy())?;
        }

        Ok(())
    }
}

/// Execute external commands.
pub trait CommandRunner {
    /// Run command to completion.
    ///
    /// Output of the command goes straight to the user. Blocks until the
    /// command exits.
    ///
    /// # Errors
    ///
    /// - Return [`SyscallError`] if command cannot be spawned or exits with
    ///   non-zero status.
    fn run(&self, command: &CommandSpec) -> Result<()>;
}

/// Run commands as child processes of the current process.
///
/// Children inherit stdio, so interactive prompts of package managers and
/// installers, e.g., sudo password or license acceptance, reach the user.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    #[instrument(skip(self, command), fields(command = %command), level = "debug")]
    fn run(&self, command: &CommandSpec) -> Result<()> {
        debug!("spawn {command}");
        let status = Command::new(&command.program)
            .args(&command.args)
            .envs(command.env.iter().map(|(key, value)| (key, value)))
            .spawn()
            .map_err(|err| SyscallError::Spawn {
                source: err,
                command: command.to_string(),
            })?
            .wait()
            .map_err(|err| SyscallError::Spawn {
                source: err,
                command: command.to_string(),
            })?;

        if !status.success() {
            return Err(SyscallError::Failed {
                command: command.to_string(),
                code: status.code(),
            });
        }

        Ok(())
    }
}

/// External command error types.
#[derive(Debug, thiserror::Error)]
pub enum SyscallError {
    /// Command could not be started or waited on.
    #[error("failed to run command {command:?}")]
    Spawn {
        #[source]
        source: std::io::Error,
        command: String,
    },

    /// Command exited with failure status.
    #[error("command {command:?} failed with exit status {}", .code.map_or_else(|| "unknown".to_string(), |code| code.to_string()))]
    Failed { command: String, code: Option<i32> },
}

/// Friendly result alias :3
pub type Result<T, E = SyscallError> = std::result::Result<T, E>;

// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Tool presence probing.
//!
//! A __probe__ answers one question: is an executable of a given name
//! resolvable on the search path right now? Every install step is gated on a
//! probe, and the verification report is nothing more than a probe of every
//! tool in the manifest. A missing tool is a normal outcome, never an error.

use std::{
    env::{join_paths, split_paths, var_os},
    ffi::{OsStr, OsString},
    fmt::{Display, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
};
use tracing::{debug, info, warn};

/// Result of probing for an executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// Executable resolved to this path.
    Found(PathBuf),

    /// Executable is not on the search path.
    Missing,
}

impl ProbeOutcome {
    /// Check if executable was found.
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    /// Resolved path of executable, if found.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Found(path) => Some(path.as_path()),
            Self::Missing => None,
        }
    }
}

impl Display for ProbeOutcome {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Found(path) => write!(fmt, "{}", path.display()),
            Self::Missing => fmt.write_str("not found"),
        }
    }
}

/// Search path prober.
///
/// Looks executables up on the process `$PATH` by default. A fixed search
/// path can be supplied instead, which is mostly useful for tests.
#[derive(Debug, Clone, Default)]
pub struct Probe {
    search_path: Option<OsString>,
}

impl Probe {
    /// Construct new probe over the process `$PATH`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Construct new probe over a fixed search path.
    ///
    /// The search path uses the same syntax as `$PATH`.
    pub fn with_search_path(search_path: impl Into<OsString>) -> Self {
        Self {
            search_path: Some(search_path.into()),
        }
    }

    /// Append directories to the search path.
    ///
    /// Starts from the fixed search path, or the process `$PATH` when there is
    /// none. Directories already on the search path are skipped, so nothing
    /// the host provides gets shadowed.
    pub fn extended(self, dirs: &[PathBuf]) -> Self {
        if dirs.is_empty() {
            return self;
        }

        let base = self
            .search_path
            .or_else(|| var_os("PATH"))
            .unwrap_or_default();
        let mut paths: Vec<PathBuf> = split_paths(&base)
            .filter(|path| !path.as_os_str().is_empty())
            .collect();
        for dir in dirs {
            if !paths.contains(dir) {
                paths.push(dir.clone());
            }
        }

        match join_paths(paths) {
            Ok(search_path) => Self::with_search_path(search_path),
            Err(error) => {
                warn!("cannot extend search path: {error}");
                Self::with_search_path(base)
            }
        }
    }

    /// Fixed search path, if any.
    pub fn search_path(&self) -> Option<&OsStr> {
        self.search_path.as_deref()
    }

    /// Probe for executable, logging whether it is already installed.
    pub fn probe(&self, name: &str) -> ProbeOutcome {
        let outcome = self.locate(name);
        match &outcome {
            ProbeOutcome::Found(path) => {
                info!("{name} already installed at {}", path.display())
            }
            ProbeOutcome::Missing => info!("{name} not found"),
        }

        outcome
    }

    /// Probe for executable without logging at info level.
    pub fn locate(&self, name: &str) -> ProbeOutcome {
        let result = match &self.search_path {
            Some(search_path) => {
                let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
                which::which_in(name, Some(search_path), cwd)
            }
            None => which::which(name),
        };

        match result {
            Ok(path) => ProbeOutcome::Found(path),
            Err(error) => {
                debug!("probe for {name} failed: {error}");
                ProbeOutcome::Missing
            }
        }
    }
}

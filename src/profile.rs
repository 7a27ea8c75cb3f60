// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Shell startup file mutation.
//!
//! Several tools need a line of shell code in the user's startup file before
//! they are usable, e.g., a PATH export or a `direnv hook` evaluation. Every
//! such line is added through one primitive: __ensure line present__.
//!
//! # Idempotent Append
//!
//! A line is appended only if no existing content of the startup file
//! contains its search pattern. The check is a substring search, not an exact
//! line match. Thus, hook lines of different tools that look alike must each
//! use a pattern that only matches their own line. For example, "direnv hook"
//! and "zoxide init" are safe patterns, while a bare "eval" would make the
//! second hook think it was already installed.

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    fs::{create_dir_all, read_to_string, write},
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument};

/// Outcome of ensuring a line in a startup file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileChange {
    /// Line was appended.
    Appended,

    /// Pattern was already present, file left untouched.
    AlreadyPresent,
}

/// Manage lines in a shell startup file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellProfile {
    path: PathBuf,
}

impl ShellProfile {
    /// Construct new shell profile manager over target startup file.
    ///
    /// The file does not need to exist yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path to managed startup file.
    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// Edit startup file contents.
    ///
    /// Read current contents into [`ProfileEdit`], let the editor modify it,
    /// and write it back only if something changed. A missing startup file
    /// reads as empty and is created, along with its parent directory, on
    /// write.
    ///
    /// # Errors
    ///
    /// - Return [`ProfileError::Read`] if startup file cannot be read.
    /// - Return [`ProfileError::Write`] if startup file cannot be written.
    pub fn edit<E, T>(&self, editor: E) -> Result<T>
    where
        E: FnOnce(&mut ProfileEdit) -> T,
    {
        let content = match read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => String::new(),
            Err(err) => {
                return Err(ProfileError::Read {
                    source: err,
                    profile_path: self.path.clone(),
                })
            }
        };

        let mut edit = ProfileEdit::from(content);
        let output = editor(&mut edit);

        if !edit.changed {
            return Ok(output);
        }

        if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            create_dir_all(parent).map_err(|err| ProfileError::Write {
                source: err,
                profile_path: self.path.clone(),
            })?;
        }

        write(&self.path, edit.to_string().as_bytes()).map_err(|err| ProfileError::Write {
            source: err,
            profile_path: self.path.clone(),
        })?;

        Ok(output)
    }

    /// Ensure line is present in startup file.
    ///
    /// Appends `line` unless `pattern` already occurs somewhere in the file.
    ///
    /// # Errors
    ///
    /// - Return [`ProfileError::Read`] if startup file cannot be read.
    /// - Return [`ProfileError::Write`] if startup file cannot be written.
    #[instrument(skip(self), level = "debug")]
    pub fn ensure_line(&self, line: &str, pattern: &str) -> Result<ProfileChange> {
        let change = self.edit(|edit| edit.ensure_line(line, pattern))?;
        match change {
            ProfileChange::Appended => info!("append {line:?} to {}", self.path.display()),
            ProfileChange::AlreadyPresent => {
                debug!("{pattern:?} already present in {}", self.path.display())
            }
        }

        Ok(change)
    }

    /// Check if pattern occurs in startup file.
    ///
    /// # Errors
    ///
    /// - Return [`ProfileError::Read`] if startup file cannot be read.
    pub fn contains(&self, pattern: &str) -> Result<bool> {
        self.edit(|edit| edit.contains(pattern))
    }
}

/// Startup file editor.
///
/// # Invariant
///
/// - Existing content is never modified, only appended to.
/// - A line is never appended while its pattern is present.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProfileEdit {
    content: String,
    changed: bool,
}

impl ProfileEdit {
    /// Construct new empty editor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if pattern occurs anywhere in content.
    pub fn contains(&self, pattern: &str) -> bool {
        self.content.contains(pattern)
    }

    /// Append line unless pattern is present.
    ///
    /// A blank pattern stands for the line itself, and a blank line is never
    /// appended.
    pub fn ensure_line(&mut self, line: &str, pattern: &str) -> ProfileChange {
        let pattern = if pattern.trim().is_empty() { line } else { pattern };
        if line.trim().is_empty() || self.contains(pattern) {
            return ProfileChange::AlreadyPresent;
        }

        // INVARIANT: Never glue new line onto an unterminated last line.
        if !self.content.is_empty() && !self.content.ends_with('\n') {
            self.content.push('\n');
        }
        self.content.push_str(line);
        self.content.push('\n');
        self.changed = true;

        ProfileChange::Appended
    }
}

impl Display for ProfileEdit {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(&self.content)
    }
}

impl From<String> for ProfileEdit {
    fn from(content: String) -> Self {
        Self {
            content,
            changed: false,
        }
    }
}

impl From<&str> for ProfileEdit {
    fn from(content: &str) -> Self {
        Self::from(content.to_string())
    }
}

/// Startup file management error types.
#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    /// Startup file cannot be read from.
    #[error("failed to read from shell profile at {:?}", profile_path.display())]
    Read {
        #[source]
        source: std::io::Error,
        profile_path: PathBuf,
    },

    /// Startup file cannot be written to.
    #[error("failed to write to shell profile at {:?}", profile_path.display())]
    Write {
        #[source]
        source: std::io::Error,
        profile_path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = ProfileError> = std::result::Result<T, E>;

// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine relevent path information for external files that need to be
//! interacted with, or managed in some way, i.e., the user manifest and the
//! user's shell startup file.

use std::{env, path::PathBuf};

/// Determine absolute path to user's home directory.
///
/// Does not check if the path returned actually exists.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
pub fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().ok_or(NoWayHome)
}

/// Determine default absolute path to user manifest.
///
/// Uses XDG Base Directory path `$XDG_CONFIG_HOME/rigup/tools.toml` as the
/// default absolute path for a user manifest. Does not check if the path
/// returned actually exists.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
///
/// # See Also
///
/// - [XDG Base Directory](https://wiki.archlinux.org/title/XDG_Base_Directory)
pub fn default_manifest_path() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|path| path.join("rigup").join("tools.toml"))
        .ok_or(NoWayHome)
}

/// Name of the user's login shell.
///
/// Taken from the file name of `$SHELL`, e.g., "/usr/bin/zsh" gives "zsh".
/// Falls back to "sh" when `$SHELL` is unset or empty.
pub fn shell_name() -> String {
    env::var_os("SHELL")
        .map(PathBuf::from)
        .and_then(|path| path.file_name().map(|name| name.to_string_lossy().into_owned()))
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "sh".into())
}

/// Determine default shell startup file for the user's login shell.
///
/// Maps "zsh" to `~/.zshrc`, "bash" to `~/.bashrc`, and anything else to
/// `~/.profile`. Does not check if the path returned actually exists.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
pub fn default_shell_profile() -> Result<PathBuf> {
    let file = match shell_name().as_str() {
        "zsh" => ".zshrc",
        "bash" => ".bashrc",
        _ => ".profile",
    };

    Ok(home_dir()?.join(file))
}

/// No way to determine user's home directory.
///
/// # See Also
///
/// - [`dirs::home_dir`](https://docs.rs/dirs/latest/dirs/fn.home_dir.html)
#[derive(Clone, Debug, thiserror::Error)]
#[error("cannot determine absolute path to user's home directory")]
pub struct NoWayHome;

/// Friendly result alias :3
pub type Result<T, E = NoWayHome> = std::result::Result<T, E>;

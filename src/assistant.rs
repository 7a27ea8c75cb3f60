// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! AI coding assistant settings.
//!
//! The tools rigup provisions are what an AI coding assistant's settings file
//! points at: permission rules allow commands by prefix, auxiliary servers
//! are spawned through some command, and lifecycle hooks run shell commands
//! after events like a file write. This module reads such a settings file and
//! works out which executables it depends on, so they can be probed. The file
//! is only ever read.
//!
//! # Layout
//!
//! ```json
//! {
//!   "permissions": { "allow": ["Bash(kubectl get:*)"], "deny": [], "ask": [] },
//!   "mcpServers": { "github": { "command": "gh", "args": ["mcp"] } },
//!   "hooks": {
//!     "PostToolUse": [
//!       { "matcher": "Write|Edit", "hooks": [{ "type": "command", "command": "ruff format" }] }
//!     ]
//!   }
//! }
//! ```
//!
//! Keys other than these three groups are ignored.

use serde::Deserialize;
use std::{
    collections::{BTreeMap, BTreeSet},
    fs::read_to_string,
    path::{Path, PathBuf},
    str::FromStr,
};

/// Shell words that never name an executable worth probing.
const SHELL_BUILTINS: &[&str] = &[
    ".", "[", "cd", "echo", "eval", "exec", "exit", "export", "false", "printf", "set", "source",
    "test", "true",
];

/// Assistant settings layout.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
pub struct AssistantSettings {
    /// Permission table keyed by command prefix.
    #[serde(default)]
    pub permissions: Permissions,

    /// Auxiliary capability servers by name.
    #[serde(default, rename = "mcpServers")]
    pub servers: BTreeMap<String, ServerEntry>,

    /// Lifecycle hooks by event name.
    #[serde(default)]
    pub hooks: BTreeMap<String, Vec<HookMatcher>>,
}

impl AssistantSettings {
    /// Read and parse settings file at target path.
    ///
    /// # Errors
    ///
    /// - Return [`AssistantError::Read`] if file cannot be read.
    /// - Return [`AssistantError::Parse`] if file is not valid settings JSON.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        read_to_string(path)
            .map_err(|err| AssistantError::Read {
                source: err,
                path: path.to_path_buf(),
            })?
            .parse()
    }

    /// Executables that the settings depend on.
    ///
    /// Collected from `Bash(...)` rules that allow or ask for a command, from
    /// server commands, and from hook commands. For a command line, the first
    /// word that is not an environment assignment counts. Words holding
    /// variable expansions and shell builtins are skipped.
    pub fn referenced_programs(&self) -> BTreeSet<String> {
        let mut programs = BTreeSet::new();

        let rules = self.permissions.allow.iter().chain(&self.permissions.ask);
        for rule in rules {
            if let Some(program) = bash_rule_program(rule) {
                programs.insert(program);
            }
        }

        for server in self.servers.values() {
            if let Some(program) = command_program(&server.command) {
                programs.insert(program);
            }
        }

        let hooks = self.hooks.values().flatten().flat_map(|matcher| &matcher.hooks);
        for hook in hooks {
            if hook.kind != "command" {
                continue;
            }
            if let Some(program) = hook.command.as_deref().and_then(command_program) {
                programs.insert(program);
            }
        }

        programs
    }
}

impl FromStr for AssistantSettings {
    type Err = AssistantError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        serde_json::from_str(data).map_err(AssistantError::Parse)
    }
}

/// Allow, deny, and ask lists of permission rules.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
pub struct Permissions {
    #[serde(default)]
    pub allow: Vec<String>,

    #[serde(default)]
    pub deny: Vec<String>,

    #[serde(default)]
    pub ask: Vec<String>,
}

/// Auxiliary server registration.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerEntry {
    /// Command that starts the server.
    #[serde(default)]
    pub command: String,

    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

/// Hooks that fire for events matching a tool pattern.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
pub struct HookMatcher {
    #[serde(default)]
    pub matcher: Option<String>,

    #[serde(default)]
    pub hooks: Vec<HookEntry>,
}

/// Single hook action.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
pub struct HookEntry {
    /// Hook type, only "command" hooks run executables.
    #[serde(rename = "type", default)]
    pub kind: String,

    #[serde(default)]
    pub command: Option<String>,
}

fn bash_rule_program(rule: &str) -> Option<String> {
    let inner = rule.strip_prefix("Bash(")?.strip_suffix(')')?;
    let inner = inner.trim_end_matches(":*").trim_end_matches('*');
    command_program(inner)
}

fn command_program(command: &str) -> Option<String> {
    let word = command
        .split_whitespace()
        .find(|word| !is_env_assignment(word))?;
    if word.contains('$') || SHELL_BUILTINS.contains(&word) {
        return None;
    }

    Some(word.trim_end_matches(':').to_string()).filter(|word| !word.is_empty())
}

fn is_env_assignment(word: &str) -> bool {
    match word.split_once('=') {
        Some((key, _)) => {
            !key.is_empty() && key.chars().all(|c| c == '_' || c.is_ascii_alphanumeric())
        }
        None => false,
    }
}

/// Assistant settings error types.
#[derive(Debug, thiserror::Error)]
pub enum AssistantError {
    /// Settings file cannot be read.
    #[error("failed to read assistant settings at {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Settings file is not valid JSON of the expected layout.
    #[error(transparent)]
    Parse(#[from] serde_json::Error),
}

/// Friendly result alias :3
type Result<T, E = AssistantError> = std::result::Result<T, E>;

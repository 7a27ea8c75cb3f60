// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Declarative, idempotent tool provisioning.
//!
//! Rigup installs the command line tools a workstation needs from a single
//! __tool manifest__. Every tool goes through the same two steps: probe the
//! search path for it, and install it only when the probe comes back empty.
//! The run ends with a verification report that probes every tool once more.
//!
//! # See Also
//!
//! 1. [`config::Manifest`]
//! 2. [`provision::Provisioner`]
//! 3. [`profile::ShellProfile`]

pub mod assistant;
pub mod config;
pub mod path;
pub mod platform;
pub mod probe;
pub mod profile;
pub mod provision;

// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Verification report.
//!
//! After a run, every tool in the manifest is probed once more and listed as
//! present or absent. The report only observes. It never fails, and it never
//! hides a tool, no matter how the run before it went.

use crate::{
    config::ToolDescriptor,
    probe::{Probe, ProbeOutcome},
};

use std::fmt::{Display, Formatter, Result as FmtResult};

/// Single line of a verification report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportEntry {
    /// Tool name.
    pub name: String,

    /// Probe outcome for the tool.
    pub outcome: ProbeOutcome,
}

/// Presence checklist over a tool listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    entries: Vec<ReportEntry>,
}

impl Report {
    /// All report entries in manifest order.
    pub fn entries(&self) -> &[ReportEntry] {
        &self.entries
    }

    /// Names of tools that were not found.
    pub fn missing(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|entry| !entry.outcome.is_found())
            .map(|entry| entry.name.as_str())
            .collect()
    }

    /// Check if every tool was found.
    pub fn is_complete(&self) -> bool {
        self.entries.iter().all(|entry| entry.outcome.is_found())
    }
}

impl Display for Report {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        let width = self
            .entries
            .iter()
            .map(|entry| entry.name.len())
            .max()
            .unwrap_or(0);

        for entry in &self.entries {
            let mark = if entry.outcome.is_found() { '✓' } else { '✗' };
            writeln!(fmt, "{mark} {:<width$}  {}", entry.name, entry.outcome)?;
        }

        let found = self.entries.len() - self.missing().len();
        write!(fmt, "{found} of {} tools found", self.entries.len())
    }
}

/// Produce verification reports by probing tools.
#[derive(Debug, Clone)]
pub struct Reporter<'a> {
    probe: &'a Probe,
}

impl<'a> Reporter<'a> {
    /// Construct new reporter over target probe.
    pub fn new(probe: &'a Probe) -> Self {
        Self { probe }
    }

    /// Probe every tool and collect the results.
    pub fn report<'t>(&self, tools: impl IntoIterator<Item = &'t ToolDescriptor>) -> Report {
        let entries = tools
            .into_iter()
            .map(|tool| ReportEntry {
                name: tool.name.clone(),
                outcome: self.probe.locate(tool.probe_name()),
            })
            .collect();

        Report { entries }
    }

    /// Probe bare executable names and collect the results.
    pub fn report_names(&self, names: impl IntoIterator<Item = impl AsRef<str>>) -> Report {
        let entries = names
            .into_iter()
            .map(|name| ReportEntry {
                name: name.as_ref().to_string(),
                outcome: self.probe.locate(name.as_ref()),
            })
            .collect();

        Report { entries }
    }
}

// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use rigup::{
    assistant::AssistantSettings,
    config::{Manifest, DEFAULT_MANIFEST},
    path::{default_manifest_path, default_shell_profile, shell_name},
    platform::{preflight, Arch, HostInfo, Platform},
    probe::Probe,
    profile::ShellProfile,
    provision::{
        download::HttpFetcher, report::Reporter, syscall::SystemRunner, Provisioner,
    },
};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::{fs::read_to_string, path::PathBuf, process::exit, time::Duration};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "rigup [options] <rigup-command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    fn run(self) -> Result<()> {
        match self.command {
            Command::Provision(opts) => run_provision(opts),
            Command::Verify(opts) => run_verify(opts),
            Command::Probe(opts) => run_probe(opts),
            Command::List(opts) => run_list(opts),
            Command::Manifest => run_manifest(),
            Command::AuditSettings(opts) => run_audit_settings(opts),
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Install every missing tool, then print a verification report.
    #[command(override_usage = "rigup provision [options]")]
    Provision(ProvisionOptions),

    /// Print verification report without installing anything.
    #[command(override_usage = "rigup verify [options]")]
    Verify(VerifyOptions),

    /// Probe search path for executables.
    #[command(override_usage = "rigup probe <name>...")]
    Probe(ProbeOptions),

    /// List tool descriptors for target platform.
    #[command(override_usage = "rigup list [options]")]
    List(ListOptions),

    /// Print the built-in tool manifest.
    #[command(override_usage = "rigup manifest")]
    Manifest,

    /// Check executables referenced by AI assistant settings.
    #[command(override_usage = "rigup audit-settings <settings_file>")]
    AuditSettings(AuditSettingsOptions),
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct ProvisionOptions {
    /// Path to tool manifest to use instead of the default one.
    #[arg(short, long, value_name = "path")]
    pub manifest: Option<PathBuf>,

    /// Platform to provision for, must match the host.
    #[arg(short, long, value_name = "linux|macos")]
    pub platform: Option<Platform>,

    /// Only provision tools of these groups.
    #[arg(short, long = "group", value_name = "group")]
    pub groups: Vec<String>,

    /// Log what would be installed without changing anything.
    #[arg(short = 'n', long)]
    pub dry_run: bool,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct VerifyOptions {
    /// Path to tool manifest to use instead of the default one.
    #[arg(short, long, value_name = "path")]
    pub manifest: Option<PathBuf>,

    /// Only verify tools of these groups.
    #[arg(short, long = "group", value_name = "group")]
    pub groups: Vec<String>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct ProbeOptions {
    /// Names of executables to probe for.
    #[arg(required = true, value_name = "name")]
    pub names: Vec<String>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct ListOptions {
    /// Path to tool manifest to use instead of the default one.
    #[arg(short, long, value_name = "path")]
    pub manifest: Option<PathBuf>,

    /// Platform to list install strategies for, defaults to the host.
    #[arg(short, long, value_name = "linux|macos")]
    pub platform: Option<Platform>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct AuditSettingsOptions {
    /// Path to assistant settings file.
    #[arg(required = true, value_name = "settings_file")]
    pub settings: PathBuf,
}

fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .with_writer(std::io::stderr)
        .without_time();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = run() {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

fn run() -> Result<()> {
    Cli::parse().run()
}

fn run_provision(opts: ProvisionOptions) -> Result<()> {
    // INVARIANT: Preconditions hold before the manifest is even looked at.
    let platform = preflight(opts.platform, &HostInfo::detect())?;
    let arch = Arch::detect()?;
    let manifest = load_manifest(opts.manifest)?;

    let profile = match &manifest.settings.profile {
        Some(path) => path.clone(),
        None => default_shell_profile()?,
    };
    let fetcher = HttpFetcher::new(Duration::from_secs(
        manifest.settings.download_timeout_secs,
    ))?;
    let provisioner = Provisioner::new(
        platform,
        arch,
        manifest.settings.clone(),
        SystemRunner,
        fetcher,
        ShellProfile::new(profile),
        shell_name(),
    )
    .with_dry_run(opts.dry_run);

    let tools = manifest.tools_in_groups(&opts.groups)?;
    let run = provisioner.provision(tools.iter().copied());
    info!("{} tools freshly installed", run.installed_count());

    // INVARIANT: Report every tool even if the run aborted, then surface the failure.
    let report = Reporter::new(provisioner.probe()).report(tools.iter().copied());
    println!("{report}");
    run.into_result()?;

    Ok(())
}

fn run_verify(opts: VerifyOptions) -> Result<()> {
    let manifest = load_manifest(opts.manifest)?;
    let tools = manifest.tools_in_groups(&opts.groups)?;
    let probe = Probe::new().extended(&manifest.settings.search_paths);
    let report = Reporter::new(&probe).report(tools.iter().copied());
    println!("{report}");

    let missing = report.missing();
    if !missing.is_empty() {
        warn!("missing tools: {}", missing.join(", "));
    }

    Ok(())
}

fn run_probe(opts: ProbeOptions) -> Result<()> {
    let probe = Probe::new();
    for name in &opts.names {
        probe.probe(name);
    }

    println!("{}", Reporter::new(&probe).report_names(&opts.names));

    Ok(())
}

fn run_list(opts: ListOptions) -> Result<()> {
    let platform = match opts.platform {
        Some(platform) => platform,
        None => HostInfo::detect()
            .platform()
            .ok_or_else(|| anyhow!("cannot determine host platform, pass --platform"))?,
    };
    let manifest = load_manifest(opts.manifest)?;

    for tool in manifest.ordered_tools() {
        let strategy = tool
            .strategy_for(platform)
            .map_or("unsupported", |strategy| strategy.kind());
        println!(
            "{:<16} {:<24} {:<12} {}",
            tool.group, tool.name, tool.version, strategy
        );
    }

    Ok(())
}

fn run_manifest() -> Result<()> {
    print!("{DEFAULT_MANIFEST}");

    Ok(())
}

fn run_audit_settings(opts: AuditSettingsOptions) -> Result<()> {
    let settings = AssistantSettings::load(&opts.settings)?;
    let programs = settings.referenced_programs();
    info!(
        "{} references {} executables",
        opts.settings.display(),
        programs.len()
    );

    let probe = Probe::new();
    let report = Reporter::new(&probe).report_names(&programs);
    println!("{report}");

    let missing = report.missing();
    if !missing.is_empty() {
        warn!("assistant settings reference missing executables: {}", missing.join(", "));
    }

    Ok(())
}

fn load_manifest(path: Option<PathBuf>) -> Result<Manifest> {
    let path = match path {
        Some(path) => Some(path),
        None => Some(default_manifest_path()?).filter(|path| path.exists()),
    };

    match path {
        Some(path) => {
            info!("use manifest {}", path.display());
            let data = read_to_string(&path)
                .with_context(|| format!("failed to read manifest at {}", path.display()))?;
            data.parse::<Manifest>()
                .with_context(|| format!("invalid manifest at {}", path.display()))
        }
        None => Ok(Manifest::embedded()?),
    }
}


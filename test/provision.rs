// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use crate::{tarball, FakeRunner, MapFetcher, ToolboxFixture};

use anyhow::Result;
use indoc::indoc;
use pretty_assertions::assert_eq;
use rigup::{
    config::Manifest,
    platform::{preflight, HostInfo, Platform, PreflightError},
    provision::{report::Reporter, ProvisionError, ToolOutcome},
};

const KUBECTL_URL: &str = "https://dl.example.org/v1.31.1/linux/amd64/kubectl";

const WORKSTATION: &str = indoc! {r#"
    [settings]
    groups = ["containers", "productivity"]

    [[tool]]
    name = "direnv"
    version = "latest"
    group = "productivity"
    install = { strategy = "package" }
    profile = [{ line = 'eval "$(direnv hook {shell})"', pattern = "direnv hook" }]

    [[tool]]
    name = "zoxide"
    version = "0.9.6"
    group = "productivity"
    install = { strategy = "package" }
    profile = [{ line = 'eval "$(zoxide init {shell})"', pattern = "zoxide init" }]

    [[tool]]
    name = "kubectl"
    version = "1.31.1"
    group = "containers"
    install = { strategy = "download", url = "https://dl.example.org/v{version}/{os}/{arch}/kubectl" }

    [[tool]]
    name = "podman"
    version = "4.9.3"
    group = "containers"
    install = { strategy = "package" }
"#};

fn fetcher() -> MapFetcher {
    MapFetcher::default().with_body(KUBECTL_URL, b"#!/bin/sh\n".to_vec())
}

#[test]
fn second_run_installs_nothing() -> Result<()> {
    let fixture = ToolboxFixture::new()?;
    let manifest: Manifest = WORKSTATION.parse()?;
    let tools = manifest.ordered_tools();
    let runner = FakeRunner::new(fixture.bin_dir());
    let fetcher = fetcher();
    let provisioner = fixture.provisioner(Platform::Linux, &runner, &fetcher);

    let first = provisioner.provision(tools.iter().copied());
    assert!(first.aborted.is_none());
    assert_eq!(first.installed_count(), 4);
    assert_eq!(
        runner.installs(),
        vec![
            "apt-get install -y podman",
            "apt-get install -y direnv",
            "apt-get install -y zoxide",
        ]
    );
    assert_eq!(fetcher.fetched(), vec![KUBECTL_URL]);

    runner.clear();
    let second = provisioner.provision(tools.iter().copied());
    assert!(second.aborted.is_none());
    assert_eq!(second.installed_count(), 0);
    assert!(second
        .outcomes
        .iter()
        .all(|(_, outcome)| matches!(outcome, ToolOutcome::AlreadyInstalled(_))));
    assert!(runner.commands().is_empty());
    assert_eq!(fetcher.fetched().len(), 1);

    let report = Reporter::new(provisioner.probe()).report(tools.iter().copied());
    assert!(report.is_complete());

    Ok(())
}

#[test]
fn groups_run_in_configured_order() -> Result<()> {
    let fixture = ToolboxFixture::new()?;
    let manifest: Manifest = WORKSTATION.parse()?;
    let runner = FakeRunner::new(fixture.bin_dir());
    let fetcher = fetcher();
    let provisioner = fixture.provisioner(Platform::Linux, &runner, &fetcher);

    let run = provisioner.provision(manifest.ordered_tools());
    let order: Vec<&str> = run.outcomes.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(order, vec!["kubectl", "podman", "direnv", "zoxide"]);

    Ok(())
}

#[test]
fn profile_lines_are_appended_once() -> Result<()> {
    let fixture = ToolboxFixture::new()?;
    let manifest: Manifest = WORKSTATION.parse()?;
    let runner = FakeRunner::new(fixture.bin_dir());
    let fetcher = fetcher();
    let provisioner = fixture.provisioner(Platform::Linux, &runner, &fetcher);

    let first = provisioner.provision(manifest.ordered_tools());
    assert!(first.aborted.is_none());
    assert_eq!(first.profile_lines.len(), 2);
    for _ in 0..2 {
        let run = provisioner.provision(manifest.ordered_tools());
        assert!(run.aborted.is_none());
        assert!(run.profile_lines.is_empty());
    }

    let expect = indoc! {r#"
        eval "$(direnv hook zsh)"
        eval "$(zoxide init zsh)"
    "#};
    assert_eq!(fixture.profile()?, expect);

    Ok(())
}

#[test]
fn existing_hook_line_matches_by_pattern() -> Result<()> {
    let fixture = ToolboxFixture::new()?;
    std::fs::write(
        fixture.profile_path(),
        "export EDITOR=vim\neval \"$(direnv hook bash)\"",
    )?;
    fixture.preinstall("direnv")?;
    fixture.preinstall("zoxide")?;

    let manifest: Manifest = WORKSTATION.parse()?;
    let runner = FakeRunner::new(fixture.bin_dir());
    let fetcher = fetcher();
    let provisioner = fixture.provisioner(Platform::Linux, &runner, &fetcher);
    let run = provisioner.provision(manifest.ordered_tools());
    assert!(run.aborted.is_none());

    // INVARIANT: Both tools were already present, so only profile lines changed.
    assert_eq!(runner.installs(), vec!["apt-get install -y podman"]);
    let expect = indoc! {r#"
        export EDITOR=vim
        eval "$(direnv hook bash)"
        eval "$(zoxide init zsh)"
    "#};
    assert_eq!(fixture.profile()?, expect);

    Ok(())
}

#[test]
fn failed_install_stops_run_but_report_lists_every_tool() -> Result<()> {
    let fixture = ToolboxFixture::new()?;
    let manifest: Manifest = indoc! {r#"
        [[tool]]
        name = "podman"
        version = "4.9.3"
        install = { strategy = "package" }

        [[tool]]
        name = "ollama"
        version = "0.3.14"
        install = { strategy = "script", url = "https://ollama.com/install.sh" }

        [[tool]]
        name = "jq"
        version = "latest"
        install = { strategy = "package" }
    "#}
    .parse()?;
    let tools = manifest.ordered_tools();
    let runner = FakeRunner::new(fixture.bin_dir());
    let fetcher = MapFetcher::default();
    let provisioner = fixture.provisioner(Platform::Linux, &runner, &fetcher);

    let run = provisioner.provision(tools.iter().copied());
    assert!(matches!(
        &run.aborted,
        Some(ProvisionError::Install { tool, .. }) if tool == "ollama"
    ));
    assert_eq!(run.outcomes.len(), 1);
    assert!(!runner.commands().iter().any(|line| line.contains("jq")));

    let report = Reporter::new(provisioner.probe()).report(tools.iter().copied());
    assert_eq!(report.entries().len(), 3);
    assert_eq!(report.missing(), vec!["ollama", "jq"]);
    assert!(report.to_string().ends_with("1 of 3 tools found"));
    assert!(run.into_result().is_err());

    Ok(())
}

#[test]
fn failed_package_command_is_fatal() -> Result<()> {
    let fixture = ToolboxFixture::new()?;
    let manifest: Manifest = WORKSTATION.parse()?;
    let runner = FakeRunner::new(fixture.bin_dir()).failing_on("install -y podman");
    let fetcher = fetcher();
    let provisioner = fixture.provisioner(Platform::Linux, &runner, &fetcher);

    let run = provisioner.provision(manifest.ordered_tools());
    let names: Vec<&str> = run.outcomes.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(names, vec!["kubectl"]);
    assert!(matches!(
        run.aborted,
        Some(ProvisionError::Install { ref tool, .. }) if tool == "podman"
    ));
    assert_eq!(fixture.profile()?, "");

    Ok(())
}

#[test]
fn failed_follow_up_step_does_not_abort() -> Result<()> {
    let fixture = ToolboxFixture::new()?;
    let manifest: Manifest = indoc! {r#"
        [[tool]]
        name = "git-lfs"
        version = "latest"
        install = { strategy = "package" }
        after = [{ command = ["git", "lfs", "install", "--skip-repo"] }]

        [[tool]]
        name = "jq"
        version = "latest"
        install = { strategy = "package" }
    "#}
    .parse()?;
    let runner = FakeRunner::new(fixture.bin_dir()).failing_on("git lfs");
    let fetcher = MapFetcher::default();
    let provisioner = fixture.provisioner(Platform::Linux, &runner, &fetcher);

    let run = provisioner.provision(manifest.ordered_tools());
    assert!(run.aborted.is_none());
    assert_eq!(run.installed_count(), 2);

    Ok(())
}

#[test]
fn dry_run_changes_nothing() -> Result<()> {
    let fixture = ToolboxFixture::new()?;
    fixture.preinstall("direnv")?;
    let manifest: Manifest = WORKSTATION.parse()?;
    let runner = FakeRunner::new(fixture.bin_dir());
    let fetcher = fetcher();
    let provisioner = fixture
        .provisioner(Platform::Linux, &runner, &fetcher)
        .with_dry_run(true);

    let run = provisioner.provision(manifest.ordered_tools());
    assert!(run.aborted.is_none());
    let planned = run
        .outcomes
        .iter()
        .filter(|(_, outcome)| *outcome == ToolOutcome::Planned)
        .count();
    assert_eq!(planned, 3);
    assert_eq!(
        run.profile_lines,
        vec![
            ("direnv".to_string(), r#"eval "$(direnv hook zsh)""#.to_string()),
            ("zoxide".to_string(), r#"eval "$(zoxide init zsh)""#.to_string()),
        ]
    );
    assert!(runner.commands().is_empty());
    assert!(fetcher.fetched().is_empty());
    assert!(!fixture.profile_path().exists());

    Ok(())
}

#[test]
fn duplicate_entries_install_once() -> Result<()> {
    let fixture = ToolboxFixture::new()?;
    let manifest: Manifest = indoc! {r#"
        [[tool]]
        name = "lazygit"
        version = "0.44.1"
        install = { strategy = "package" }

        [[tool]]
        name = "gh"
        version = "2.59.0"
        install = { strategy = "package" }

        [[tool]]
        name = "lazygit"
        version = "0.44.1"
        install = { strategy = "package" }
    "#}
    .parse()?;
    let runner = FakeRunner::new(fixture.bin_dir());
    let fetcher = MapFetcher::default();
    let provisioner = fixture.provisioner(Platform::Linux, &runner, &fetcher);

    let run = provisioner.provision(manifest.ordered_tools());
    assert_eq!(run.outcomes.len(), 2);
    assert_eq!(
        runner.installs(),
        vec!["apt-get install -y lazygit", "apt-get install -y gh"]
    );

    Ok(())
}

#[test]
fn macos_uses_brew_and_skips_linux_only_tools() -> Result<()> {
    let fixture = ToolboxFixture::new()?;
    let manifest: Manifest = indoc! {r#"
        [[tool]]
        name = "podman"
        version = "4.9.3"
        install = { strategy = "package" }

        [[tool]]
        name = "tldr"
        version = "latest"
        linux = { strategy = "package" }
    "#}
    .parse()?;
    let runner = FakeRunner::new(fixture.bin_dir());
    let fetcher = MapFetcher::default();
    let provisioner = fixture.provisioner(Platform::Macos, &runner, &fetcher);

    let run = provisioner.provision(manifest.ordered_tools());
    assert!(run.aborted.is_none());
    assert_eq!(runner.commands(), vec!["brew install podman"]);
    assert_eq!(run.outcomes[1], ("tldr".to_string(), ToolOutcome::Unsupported));

    Ok(())
}

#[test]
fn preconditions_fail_before_any_install() {
    let ubuntu = Some("ID=ubuntu\nID_LIKE=debian\n".to_string());

    let root = HostInfo {
        kernel: "Linux".into(),
        os_release: ubuntu.clone(),
        euid: 0,
    };
    assert!(matches!(
        preflight(None, &root),
        Err(PreflightError::RunningAsRoot)
    ));

    let linux = HostInfo {
        kernel: "Linux".into(),
        os_release: ubuntu,
        euid: 1000,
    };
    assert!(matches!(
        preflight(Some(Platform::Macos), &linux),
        Err(PreflightError::PlatformMismatch { .. })
    ));
    assert_eq!(preflight(None, &linux).ok(), Some(Platform::Linux));
}

#[test]
fn stock_ubuntu_gets_languages_and_linters_from_default_manifest() -> Result<()> {
    let fixture = ToolboxFixture::new()?;
    fixture.preinstall("python3")?;
    let manifest = Manifest::embedded()?;
    let tools = manifest.tools_in_groups(&["languages".into(), "linters".into()])?;

    let home = fixture.home();
    let local_bin = home.join(".local/bin");
    let cargo_bin = home.join(".cargo/bin");
    let shims = home.join(".local/share/mise/shims");
    let runner = FakeRunner::new(fixture.bin_dir())
        .provides("mise installer", [local_bin.join("mise")])
        .provides("uv installer", [local_bin.join("uv"), local_bin.join("uvx")])
        .provides("rustup installer", [cargo_bin.join("rustup"), cargo_bin.join("cargo")])
        .provides("apt-get install -y golang-go", [fixture.bin_dir().join("go")])
        .provides("mise use --global node@lts", [shims.join("node"), shims.join("npm")])
        .provides("pipx install ruff==0.7.0", [local_bin.join("ruff")])
        .provides("pipx install yamllint==1.35.1", [local_bin.join("yamllint")])
        .provides("markdownlint-cli2@0.14.0", [shims.join("markdownlint-cli2")])
        .provides("golangci-lint@v1.61.0", [home.join("go/bin/golangci-lint")]);
    let fetcher = MapFetcher::default()
        .with_body("https://mise.run", "#!/bin/sh\n# mise installer\n")
        .with_body("https://astral.sh/uv/0.4.24/install.sh", "#!/bin/sh\n# uv installer\n")
        .with_body("https://sh.rustup.rs", "#!/bin/sh\n# rustup installer\n")
        .with_body(
            "https://github.com/mvdan/sh/releases/download/v3.10.0/shfmt_v3.10.0_linux_amd64",
            "#!/bin/sh\n",
        )
        .with_body(
            "https://github.com/hadolint/hadolint/releases/download/v2.12.0/hadolint-Linux-x86_64",
            "#!/bin/sh\n",
        )
        .with_body(
            "https://github.com/rhysd/actionlint/releases/download/v1.7.3/actionlint_1.7.3_linux_amd64.tar.gz",
            tarball(&[("actionlint", &b"#!/bin/sh\n"[..])])?,
        );
    let provisioner = fixture.provisioner(Platform::Linux, &runner, &fetcher);

    let run = provisioner.provision(tools.iter().copied());
    assert!(run.aborted.is_none(), "{:?}", run.aborted);
    assert_eq!(run.installed_count(), tools.len());
    assert!(run
        .outcomes
        .iter()
        .all(|(_, outcome)| matches!(outcome, ToolOutcome::Installed(Some(_)))));

    // INVARIANT: Python tools go through pipx, installed from the distribution first.
    let commands = runner.commands();
    assert!(!commands.iter().any(|line| line.starts_with("pip3")));
    let position = |wanted: &str| commands.iter().position(|line| line == wanted);
    let pipx = position("apt-get install -y pipx");
    let ruff = position("pipx install ruff==0.7.0");
    assert!(pipx.is_some() && ruff.is_some() && pipx < ruff);
    assert!(position("cargo install tokei --locked --version 12.1.2").is_none());
    assert!(position("npm install -g markdownlint-cli2@0.14.0").is_some());

    let report = Reporter::new(provisioner.probe()).report(tools.iter().copied());
    assert!(report.is_complete(), "{report}");

    Ok(())
}

#[test]
fn toolchain_outside_search_path_stops_run() -> Result<()> {
    let fixture = ToolboxFixture::new()?;
    let manifest: Manifest = indoc! {r#"
        [[tool]]
        name = "tokei"
        version = "12.1.2"
        install = { strategy = "language", ecosystem = "cargo" }
    "#}
    .parse()?;
    let runner = FakeRunner::new(fixture.bin_dir());
    let fetcher = MapFetcher::default();
    let provisioner = fixture.provisioner(Platform::Linux, &runner, &fetcher);

    let run = provisioner.provision(manifest.ordered_tools());
    assert!(matches!(
        run.aborted,
        Some(ProvisionError::Install { ref tool, .. }) if tool == "tokei"
    ));

    Ok(())
}

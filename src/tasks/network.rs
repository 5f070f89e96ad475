//! Network step: systemd-networkd setup and a connectivity check.
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result, bail};

use super::{Context, Step, Task, TaskResult};
use crate::privilege::run_elevated;

/// Repository directory holding systemd-networkd units.
pub const NETWORKD_SOURCE: &str = "etc/systemd/network";

/// Where systemd-networkd reads its units.
pub const NETWORKD_DIR: &str = "/etc/systemd/network";

/// Services enabled once the units are installed.
pub const NETWORK_SERVICES: &[&str] = &["systemd-resolved", "systemd-networkd", "iwd"];

/// Interface name prefixes treated as wired.
const WIRED_PREFIXES: &[&str] = &["enp", "eth", "eno"];

/// Whether `ip link show` output lists a wired interface that is up.
fn wired_link_up(ip_link: &str) -> bool {
    ip_link.lines().any(|line| {
        let name = line
            .split(':')
            .nth(1)
            .map(str::trim)
            .unwrap_or_default();
        line.contains("state UP") && WIRED_PREFIXES.iter().any(|p| name.starts_with(p))
    })
}

/// `*.network` units under `dir`, sorted. A missing directory has none.
fn networkd_units(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut units: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "network"))
        .collect();
    units.sort();
    units
}

/// Copy the repository's networkd units into place and enable the services.
fn configure_networkd(ctx: &Context) -> Result<()> {
    let units = networkd_units(&ctx.root().join(NETWORKD_SOURCE));
    if units.is_empty() {
        ctx.log.debug(&format!("no networkd units under {NETWORKD_SOURCE}"));
        return Ok(());
    }
    if !ctx.executor.which("systemctl") {
        ctx.log.warn("systemctl not found; leaving systemd-networkd unconfigured");
        return Ok(());
    }

    let dest_dir = Path::new(NETWORKD_DIR);
    let services = NETWORK_SERVICES.join(" ");
    if ctx.dry_run {
        for unit in &units {
            let name = unit.file_name().unwrap_or_default();
            ctx.log.dry_run(&format!(
                "would copy {} to {}",
                unit.display(),
                dest_dir.join(name).display()
            ));
        }
        ctx.log.dry_run(&format!("would enable {services}"));
        return Ok(());
    }

    let elevated = |command: &[&str]| -> Result<()> {
        run_elevated(ctx.executor.as_ref(), ctx.privilege.as_deref(), command).map(drop)
    };
    elevated(&["mkdir", "-p", NETWORKD_DIR][..]).context("creating networkd directory")?;
    for unit in &units {
        let Some(name) = unit.file_name() else {
            continue;
        };
        let dest = dest_dir.join(name);
        let (source, dest) = (unit.to_string_lossy(), dest.to_string_lossy());
        elevated(&["cp", &*source, &*dest][..]).with_context(|| format!("installing {dest}"))?;
    }
    let mut enable = vec!["systemctl", "enable", "--now"];
    enable.extend_from_slice(NETWORK_SERVICES);
    elevated(enable.as_slice()).with_context(|| format!("enabling {services}"))?;
    ctx.log.info(&format!("installed {} networkd unit(s)", units.len()));
    Ok(())
}

/// Configure systemd-networkd, then verify the host is online before
/// anything is downloaded.
#[derive(Debug)]
pub struct SetupNetwork;

impl Task for SetupNetwork {
    fn name(&self) -> &'static str {
        "Set up network"
    }

    fn step(&self) -> Step {
        Step::Network
    }

    fn should_run(&self, _ctx: &Context) -> bool {
        true
    }

    fn run(&self, ctx: &Context) -> Result<TaskResult> {
        configure_networkd(ctx)?;

        let exec = &ctx.executor;
        if let Ok(out) = exec.run_unchecked("ip", &["link", "show"])
            && out.success
            && wired_link_up(&out.stdout)
        {
            ctx.log.info("wired interface is up");
            return Ok(if ctx.dry_run { TaskResult::DryRun } else { TaskResult::Ok });
        }

        if exec.which("iwctl")
            && let Ok(out) = exec.run_unchecked("iwctl", &["station", "list"])
            && out.success
            && out.stdout.contains("connected")
        {
            ctx.log.info("wireless network connected via iwd");
            return Ok(if ctx.dry_run { TaskResult::DryRun } else { TaskResult::Ok });
        }

        bail!(
            "no active network connection detected; connect a wired or wireless network (e.g. via iwctl) and rerun"
        )
    }
}

//! Arch-family handler: pacman for queries, paru for installs.
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context as _, Result, bail};

use super::{
    HandlerDeps, OsRelease, Platform, PlatformHandler, missing_packages, os_release_matches,
};
use crate::retry::with_retry;

/// Distribution ids treated as Arch-family.
pub const ARCH_IDS: &[&str] = &["arch", "manjaro", "endeavouros"];

/// AUR helper sources.
pub const PARU_REPO: &str = "https://aur.archlinux.org/paru.git";

/// Packages needed to build an AUR helper.
const BUILD_DEPENDENCIES: &[&str] = &["base-devel", "git"];

const CLONE_ATTEMPTS: u32 = 3;

pub(super) fn matches(os: &OsRelease) -> bool {
    os.is_any_of(ARCH_IDS)
}

/// Arch Linux handler.
#[derive(Debug)]
pub struct ArchHandler {
    deps: HandlerDeps,
    clone_retry_delay: Duration,
}

impl ArchHandler {
    /// Handler over `deps`.
    #[must_use]
    pub const fn new(deps: HandlerDeps) -> Self {
        Self {
            deps,
            clone_retry_delay: Duration::from_secs(2),
        }
    }

    /// Override the pause between clone attempts.
    #[must_use]
    pub const fn with_clone_retry_delay(mut self, delay: Duration) -> Self {
        self.clone_retry_delay = delay;
        self
    }

    /// Where the AUR helper sources are cloned.
    #[must_use]
    pub fn paru_clone_dir(&self) -> PathBuf {
        self.deps.home.join("code/clones/paru")
    }

    fn install_paru(&self) -> Result<()> {
        let exec = self.deps.executor.as_ref();

        let mut install = vec!["pacman", "-S", "--needed", "--noconfirm"];
        install.extend_from_slice(BUILD_DEPENDENCIES);
        self.deps
            .run_elevated(&install)
            .context("installing AUR helper build dependencies")?;

        let clone_dir = self.paru_clone_dir();
        if let Some(parent) = clone_dir.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }

        if clone_dir.exists() {
            tracing::debug!("{} already exists, skipping clone", clone_dir.display());
        } else {
            let dest: &str = &clone_dir.to_string_lossy();
            with_retry(
                || exec.run("git", &["clone", PARU_REPO, dest]),
                "cloning paru",
                CLONE_ATTEMPTS,
                self.clone_retry_delay,
            )
            .context("cloning paru sources")?;
        }

        let jobs = exec
            .run("nproc", &[])
            .ok()
            .map(|r| r.stdout.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| "1".to_string());
        let makeflags = format!("-j{jobs}");
        exec.run_in_with_env(
            &clone_dir,
            "makepkg",
            &["-si", "--noconfirm"],
            &[("MAKEFLAGS", makeflags.as_str())],
        )
        .context("building paru")?;

        if !exec.which("paru") {
            bail!("paru is still not on PATH after building it");
        }
        Ok(())
    }
}

impl PlatformHandler for ArchHandler {
    fn platform(&self) -> Platform {
        Platform::Arch
    }

    fn detect(&self) -> bool {
        os_release_matches(&self.deps.os_release, ARCH_IDS)
    }

    fn package_manager_command(&self) -> &'static str {
        "paru"
    }

    fn update_system(&self) -> Result<()> {
        tracing::info!("updating pacman package database");
        self.deps
            .run_elevated(&["pacman", "-Sy"])
            .context("updating package database")
    }

    fn setup_package_manager(&self) -> Result<()> {
        if self.deps.executor.which("paru") {
            tracing::info!("paru is already installed");
            return Ok(());
        }
        tracing::info!("installing paru AUR helper");
        self.install_paru()?;
        tracing::info!("paru installed");
        Ok(())
    }

    fn is_package_installed(&self, name: &str) -> bool {
        self.deps
            .executor
            .run_unchecked("pacman", &["-Q", name])
            .is_ok_and(|r| r.success)
    }

    fn install_packages(&self, names: &[String]) -> Result<()> {
        let missing = missing_packages(self, names);
        if missing.is_empty() {
            tracing::info!("all packages are already installed");
            return Ok(());
        }

        let _elevation = self.deps.privilege.as_ref().map(|p| p.bracket());
        let mut args = vec!["-S", "--needed", "--noconfirm"];
        args.extend(missing.iter().map(String::as_str));
        self.deps
            .executor
            .run("paru", &args)
            .with_context(|| format!("installing {}", missing.join(", ")))?;
        tracing::info!("installed {}", missing.join(", "));
        Ok(())
    }
}

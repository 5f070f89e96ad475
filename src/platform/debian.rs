//! Debian-family handler: dpkg-query for queries, apt-get for installs.
use anyhow::{Context as _, Result};

use super::{
    HandlerDeps, OsRelease, Platform, PlatformHandler, missing_packages, os_release_matches,
};
use crate::error::PlatformError;

/// Distribution ids (or `ID_LIKE` tokens) treated as Debian-family.
pub const DEBIAN_IDS: &[&str] = &["ubuntu", "debian"];

/// Installed during package-manager setup.
const BASE_PACKAGES: &[&str] = &[
    "software-properties-common",
    "apt-transport-https",
    "ca-certificates",
    "curl",
];

pub(super) fn matches(os: &OsRelease) -> bool {
    os.is_any_of(DEBIAN_IDS)
}

/// Debian and Ubuntu handler.
#[derive(Debug)]
pub struct DebianHandler {
    deps: HandlerDeps,
}

impl DebianHandler {
    /// Handler over `deps`.
    #[must_use]
    pub const fn new(deps: HandlerDeps) -> Self {
        Self { deps }
    }
}

impl PlatformHandler for DebianHandler {
    fn platform(&self) -> Platform {
        Platform::Debian
    }

    fn detect(&self) -> bool {
        os_release_matches(&self.deps.os_release, DEBIAN_IDS)
    }

    fn package_manager_command(&self) -> &'static str {
        "apt"
    }

    fn update_system(&self) -> Result<()> {
        tracing::info!("updating apt package index");
        self.deps
            .run_elevated(&["apt-get", "update"])
            .context("updating package index")
    }

    fn setup_package_manager(&self) -> Result<()> {
        if !self.deps.executor.which("apt-get") {
            return Err(PlatformError::Unsupported(
                "apt-get not found on PATH; cannot manage packages on this host".to_string(),
            )
            .into());
        }
        let base: Vec<String> = BASE_PACKAGES.iter().map(ToString::to_string).collect();
        self.install_packages(&base)
            .context("installing apt base packages")
    }

    fn is_package_installed(&self, name: &str) -> bool {
        self.deps
            .executor
            .run_unchecked("dpkg-query", &["-W", "-f=${Status}", name])
            .is_ok_and(|r| r.success && r.stdout.contains("ok installed"))
    }

    fn install_packages(&self, names: &[String]) -> Result<()> {
        let missing = missing_packages(self, names);
        if missing.is_empty() {
            tracing::info!("all packages are already installed");
            return Ok(());
        }

        let _elevation = self.deps.privilege.as_ref().map(|p| p.bracket());
        let mut args = vec!["apt-get", "install", "-y"];
        args.extend(missing.iter().map(String::as_str));
        self.deps
            .run_elevated(&args)
            .with_context(|| format!("installing {}", missing.join(", ")))?;
        tracing::info!("installed {}", missing.join(", "));
        Ok(())
    }
}

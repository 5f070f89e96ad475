//! Host distribution detection and the package-manager capability.
//!
//! [`Platform`] is derived once per run from `/etc/os-release` (or forced by
//! `--arch`/`--debian`). [`handler_for`] maps it to a [`PlatformHandler`],
//! the one interface the rest of the crate uses to query and install
//! packages.
pub mod arch;
pub mod debian;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::PlatformError;
use crate::exec::Executor;
use crate::privilege::PrivilegeManager;

pub use arch::ArchHandler;
pub use debian::DebianHandler;

/// Default location of the host identification file.
pub const OS_RELEASE: &str = "/etc/os-release";

/// Distribution family of the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    /// Arch Linux and derivatives (pacman + AUR helper).
    Arch,
    /// Debian, Ubuntu and derivatives (apt).
    Debian,
    /// Anything else. Package installation is refused.
    Unknown,
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Arch => write!(f, "arch"),
            Self::Debian => write!(f, "debian"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

impl Platform {
    /// Key used in package definitions (`arch` / `ubuntu`).
    #[must_use]
    pub const fn key(self) -> Option<&'static str> {
        match self {
            Self::Arch => Some("arch"),
            Self::Debian => Some("ubuntu"),
            Self::Unknown => None,
        }
    }

    /// Detect the running host from [`OS_RELEASE`].
    #[must_use]
    pub fn detect() -> Self {
        Self::detect_from(Path::new(OS_RELEASE))
    }

    /// Detect from an os-release file; unreadable files yield [`Platform::Unknown`].
    #[must_use]
    pub fn detect_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_os_release(&OsRelease::parse(&content)),
            Err(e) => {
                tracing::debug!("cannot read {}: {e}", path.display());
                Self::Unknown
            }
        }
    }

    /// Classify parsed identification data. Arch-family wins if both match.
    #[must_use]
    pub fn from_os_release(os: &OsRelease) -> Self {
        if arch::matches(os) {
            Self::Arch
        } else if debian::matches(os) {
            Self::Debian
        } else {
            Self::Unknown
        }
    }

    /// Use `forced` if given, otherwise detect.
    #[must_use]
    pub fn resolve(forced: Option<Self>) -> Self {
        forced.unwrap_or_else(Self::detect)
    }
}

/// The `ID` and `ID_LIKE` fields of an os-release file, lowercased.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OsRelease {
    /// `ID`.
    pub id: String,
    /// Whitespace-separated `ID_LIKE` tokens.
    pub id_like: Vec<String>,
}

impl OsRelease {
    /// Parse os-release `KEY=value` lines; quotes are stripped.
    #[must_use]
    pub fn parse(content: &str) -> Self {
        let mut out = Self::default();
        for line in content.lines() {
            let Some((key, value)) = line.trim().split_once('=') else {
                continue;
            };
            let value = value.trim().trim_matches(['"', '\'']).to_lowercase();
            match key.trim() {
                "ID" => out.id = value,
                "ID_LIKE" => out.id_like = value.split_whitespace().map(String::from).collect(),
                _ => {}
            }
        }
        out
    }

    /// `ID` followed by every `ID_LIKE` token.
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.id.as_str()).chain(self.id_like.iter().map(String::as_str))
    }

    /// Whether any token is in `family`.
    #[must_use]
    pub fn is_any_of(&self, family: &[&str]) -> bool {
        self.tokens().any(|t| family.contains(&t))
    }
}

/// Read os-release at `path` and test it against `family`; false on any failure.
pub(crate) fn os_release_matches(path: &Path, family: &[&str]) -> bool {
    std::fs::read_to_string(path).is_ok_and(|c| OsRelease::parse(&c).is_any_of(family))
}

/// Interpret the mutually exclusive override flags.
///
/// # Errors
///
/// Returns [`PlatformError::ConflictingOverrides`] when both are set.
pub const fn platform_from_flags(
    arch: bool,
    debian: bool,
) -> Result<Option<Platform>, PlatformError> {
    match (arch, debian) {
        (true, true) => Err(PlatformError::ConflictingOverrides),
        (true, false) => Ok(Some(Platform::Arch)),
        (false, true) => Ok(Some(Platform::Debian)),
        (false, false) => Ok(None),
    }
}

/// Package-management capability of one distribution family.
#[cfg_attr(test, mockall::automock)]
pub trait PlatformHandler: Send + Sync {
    /// Family this handler serves.
    fn platform(&self) -> Platform;

    /// Whether the host belongs to this family. Never fails.
    fn detect(&self) -> bool;

    /// Canonical package tool name, for logs.
    fn package_manager_command(&self) -> &'static str;

    /// Refresh the package index.
    ///
    /// # Errors
    ///
    /// Returns an error if the refresh command fails.
    fn update_system(&self) -> anyhow::Result<()>;

    /// Make sure the package tool is usable, bootstrapping it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the bootstrap fails.
    fn setup_package_manager(&self) -> anyhow::Result<()>;

    /// Whether `name` is installed. Query failures count as not installed.
    fn is_package_installed(&self, name: &str) -> bool;

    /// Install every name in `names` that is not already installed, in one batch.
    ///
    /// # Errors
    ///
    /// Returns an error if the install command fails.
    fn install_packages(&self, names: &[String]) -> anyhow::Result<()>;
}

/// The subset of `names` that `handler` reports as not installed.
pub fn missing_packages(handler: &dyn PlatformHandler, names: &[String]) -> Vec<String> {
    names
        .iter()
        .filter(|name| {
            let installed = handler.is_package_installed(name);
            if installed {
                tracing::debug!("{name} is already installed, skipping");
            }
            !installed
        })
        .cloned()
        .collect()
}

/// Shared dependencies of the concrete handlers.
#[derive(Clone)]
pub struct HandlerDeps {
    /// Command runner.
    pub executor: Arc<dyn Executor>,
    /// Attached privilege manager, if any.
    pub privilege: Option<Arc<PrivilegeManager>>,
    /// Invoking user's home directory.
    pub home: PathBuf,
    /// os-release file consulted by `detect`.
    pub os_release: PathBuf,
}

impl fmt::Debug for HandlerDeps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerDeps")
            .field("privilege", &self.privilege)
            .field("home", &self.home)
            .field("os_release", &self.os_release)
            .finish_non_exhaustive()
    }
}

impl HandlerDeps {
    /// Dependencies reading the real [`OS_RELEASE`].
    #[must_use]
    pub fn new(
        executor: Arc<dyn Executor>,
        privilege: Option<Arc<PrivilegeManager>>,
        home: impl Into<PathBuf>,
    ) -> Self {
        Self {
            executor,
            privilege,
            home: home.into(),
            os_release: PathBuf::from(OS_RELEASE),
        }
    }

    /// Read identification data from `path` instead.
    #[must_use]
    pub fn with_os_release(mut self, path: impl Into<PathBuf>) -> Self {
        self.os_release = path.into();
        self
    }

    pub(crate) fn run_elevated(&self, command: &[&str]) -> anyhow::Result<()> {
        crate::privilege::run_elevated(
            self.executor.as_ref(),
            self.privilege.as_deref(),
            command,
        )?;
        Ok(())
    }
}

/// Build the handler for `platform`.
///
/// # Errors
///
/// Returns [`PlatformError::Unsupported`] for [`Platform::Unknown`].
pub fn handler_for(
    platform: Platform,
    deps: HandlerDeps,
) -> Result<Box<dyn PlatformHandler>, PlatformError> {
    match platform {
        Platform::Arch => Ok(Box::new(ArchHandler::new(deps))),
        Platform::Debian => Ok(Box::new(DebianHandler::new(deps))),
        Platform::Unknown => Err(PlatformError::Unsupported(
            "no supported distribution detected (expected Arch or Debian family)".to_string(),
        )),
    }
}

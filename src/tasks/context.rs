//! Per-run state shared by every task.
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;

use crate::config::{ConfigStore, Template};
use crate::error::PlatformError;
use crate::exec::Executor;
use crate::logging::Log;
use crate::platform::{Platform, PlatformHandler};
use crate::privilege::{ElevationGuard, PrivilegeManager};
use crate::resources::symlink::SymlinkManager;

/// Shared context for task execution.
pub struct Context {
    /// Configuration artifacts for this run.
    pub store: Arc<ConfigStore>,
    /// The selected template, already loaded and validated.
    pub template: Arc<Template>,
    /// Host distribution family (detected or forced).
    pub platform: Platform,
    /// Package handler for [`Context::platform`]; `None` when unsupported.
    pub handler: Option<Arc<dyn PlatformHandler>>,
    /// Temporary sudoers grant used around privileged batches.
    pub privilege: Option<Arc<PrivilegeManager>>,
    /// Logger for output and task recording.
    pub log: Arc<dyn Log>,
    /// Whether to perform a dry run (preview changes without applying).
    pub dry_run: bool,
    /// User's home directory path.
    pub home: PathBuf,
    /// Command executor (for testing or real system calls).
    pub executor: Arc<dyn Executor>,
    /// Login shell from `$SHELL`, if set.
    pub login_shell: Option<String>,
    /// Run the private-packages step even if the template does not ask for it.
    pub force_private: bool,
    /// `$XDG_CONFIG_HOME`, if set.
    pub xdg_config_home: Option<PathBuf>,
    /// Already-correct links seen by every [`Context::symlink_manager`].
    pub symlinks_skipped: Arc<AtomicUsize>,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("root", &self.store.root())
            .field("template", &self.template.name)
            .field("platform", &self.platform)
            .field("handler", &self.handler.as_ref().map(|_| "<dyn PlatformHandler>"))
            .field("privilege", &self.privilege)
            .field("log", &"<dyn Log>")
            .field("dry_run", &self.dry_run)
            .field("home", &self.home)
            .field("executor", &"<dyn Executor>")
            .field("login_shell", &self.login_shell)
            .field("force_private", &self.force_private)
            .field("xdg_config_home", &self.xdg_config_home)
            .field("symlinks_skipped", &self.skipped_symlinks())
            .finish()
    }
}

impl Context {
    /// Creates a new context for task execution on an unknown platform.
    ///
    /// # Errors
    ///
    /// Returns an error if the HOME environment variable is not set.
    pub fn new(
        store: Arc<ConfigStore>,
        template: Arc<Template>,
        log: Arc<dyn Log>,
        executor: Arc<dyn Executor>,
    ) -> Result<Self> {
        let home = std::env::var("HOME")
            .map_err(|_| anyhow::anyhow!("HOME environment variable is not set"))?;

        Ok(Self {
            store,
            template,
            platform: Platform::Unknown,
            handler: None,
            privilege: None,
            log,
            dry_run: false,
            home: PathBuf::from(home),
            executor,
            login_shell: std::env::var("SHELL").ok(),
            force_private: false,
            xdg_config_home: std::env::var_os("XDG_CONFIG_HOME")
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
            symlinks_skipped: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Attach the platform and its handler.
    #[must_use]
    pub fn with_platform(
        mut self,
        platform: Platform,
        handler: Option<Arc<dyn PlatformHandler>>,
    ) -> Self {
        self.platform = platform;
        self.handler = handler;
        self
    }

    /// Attach a privilege manager.
    #[must_use]
    pub fn with_privilege(mut self, privilege: Option<Arc<PrivilegeManager>>) -> Self {
        self.privilege = privilege;
        self
    }

    /// Preview changes only.
    #[must_use]
    pub const fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Use `home` instead of `$HOME`.
    #[must_use]
    pub fn with_home(mut self, home: impl Into<PathBuf>) -> Self {
        self.home = home.into();
        self
    }

    /// Use `shell` instead of `$SHELL`.
    #[must_use]
    pub fn with_login_shell(mut self, shell: Option<String>) -> Self {
        self.login_shell = shell;
        self
    }

    /// Force the private-packages step.
    #[must_use]
    pub const fn with_force_private(mut self, force: bool) -> Self {
        self.force_private = force;
        self
    }

    /// `$XDG_CONFIG_HOME`, falling back to `~/.config`.
    #[must_use]
    pub fn config_dir(&self) -> PathBuf {
        self.xdg_config_home
            .clone()
            .unwrap_or_else(|| self.home.join(".config"))
    }

    /// Symlink manager for this run: repository root to home, elevated
    /// through the attached privilege manager, sharing the skip counter.
    #[must_use]
    pub fn symlink_manager(&self) -> SymlinkManager {
        SymlinkManager::new(self.root(), &self.home, Arc::clone(&self.executor))
            .with_privilege(self.privilege.clone())
            .with_dry_run(self.dry_run)
            .with_skip_counter(Arc::clone(&self.symlinks_skipped))
    }

    /// Links found already in place so far this run.
    #[must_use]
    pub fn skipped_symlinks(&self) -> usize {
        self.symlinks_skipped.load(Ordering::Relaxed)
    }

    /// Root directory of the dotfiles repository.
    #[must_use]
    pub fn root(&self) -> &std::path::Path {
        self.store.root()
    }

    /// The package handler.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::Unsupported`] when the host is not a supported family.
    pub fn handler(&self) -> Result<&dyn PlatformHandler, PlatformError> {
        self.handler.as_deref().ok_or_else(|| {
            PlatformError::Unsupported(format!(
                "no package handler for platform '{}' (expected Arch or Debian family)",
                self.platform
            ))
        })
    }

    /// Open an elevation bracket unless this is a dry run or no manager is attached.
    #[must_use]
    pub fn elevate(&self) -> Option<ElevationGuard> {
        if self.dry_run {
            return None;
        }
        self.privilege.as_ref().map(PrivilegeManager::bracket)
    }
}

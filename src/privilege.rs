//! Privilege Manager: a temporary, narrowly scoped sudoers grant.
//!
//! While the grant is active the invoking user may run a fixed list of
//! binaries (package managers, link and archive tools) without a password
//! prompt. The grant is bracketed by [`PrivilegeManager::bracket`], whose
//! guard removes it on drop.
use std::fmt;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Result, bail};
use tempfile::NamedTempFile;

use crate::error::PermissionError;
use crate::exec::{ExecResult, Executor};

/// System location of the grant.
pub const SUDOERS_PATH: &str = "/etc/sudoers.d/dotfiles-provision";

/// Binaries covered by the grant. Nothing else is ever granted.
///
/// Only package managers and `ln`. Elevated backups (`mv`) and parent
/// directories (`mkdir -p`) for system links go through plain `sudo`.
pub const GRANTED_COMMANDS: &[&str] = &["pacman", "apt", "apt-get", "snap", "ln"];

const STAGED_PREFIX: &str = "dotfiles-provision";

/// Owns the lifecycle of the temporary sudoers file.
pub struct PrivilegeManager {
    executor: Arc<dyn Executor>,
    sudoers_path: PathBuf,
    staging_dir: PathBuf,
    commands: Vec<PathBuf>,
    active: AtomicBool,
}

impl fmt::Debug for PrivilegeManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivilegeManager")
            .field("sudoers_path", &self.sudoers_path)
            .field("commands", &self.commands)
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}

impl PrivilegeManager {
    /// Manager granting whichever of [`GRANTED_COMMANDS`] exist on `PATH`.
    #[must_use]
    pub fn new(executor: Arc<dyn Executor>) -> Self {
        let commands = GRANTED_COMMANDS
            .iter()
            .filter_map(|name| match which::which(name) {
                Ok(path) => Some(path),
                Err(_) => {
                    tracing::debug!("{name} not found; leaving it out of the sudoers grant");
                    None
                }
            })
            .collect();
        Self {
            executor,
            sudoers_path: PathBuf::from(SUDOERS_PATH),
            staging_dir: std::env::temp_dir(),
            commands,
            active: AtomicBool::new(false),
        }
    }

    /// Override the absolute command paths placed in the grant.
    #[must_use]
    pub fn with_commands(mut self, commands: Vec<PathBuf>) -> Self {
        self.commands = commands;
        self
    }

    /// Override where the grant is installed.
    #[must_use]
    pub fn with_sudoers_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.sudoers_path = path.into();
        self
    }

    /// Override where the grant is written before installation.
    #[must_use]
    pub fn with_staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_dir = dir.into();
        self
    }

    /// Installed grant location.
    #[must_use]
    pub fn sudoers_path(&self) -> &Path {
        &self.sudoers_path
    }

    /// Whether a grant installed by this manager is in place.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Render the sudoers content for `user`.
    #[must_use]
    pub fn render_grant(&self, user: &str) -> String {
        let mut out = String::from("# Temporary grant written by dotfiles-provision\n");
        for cmd in &self.commands {
            out.push_str(&format!("{user} ALL=(ALL) NOPASSWD: {}\n", cmd.display()));
        }
        out
    }

    /// Install the grant. A second call while active is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`PermissionError::NoElevatedSession`] without touching the
    /// system when `sudo -n true` fails, and other [`PermissionError`]s when
    /// the grant cannot be written, checked, or installed.
    pub fn setup_temporary_permissions(&self) -> Result<(), PermissionError> {
        if self.is_active() {
            tracing::debug!("temporary permissions already active");
            return Ok(());
        }

        let session = self.executor.run_unchecked("sudo", &["-n", "true"]);
        if !session.is_ok_and(|r| r.success) {
            return Err(PermissionError::NoElevatedSession);
        }

        let user = self
            .executor
            .run("id", &["-un"])
            .map_err(|e| PermissionError::UnknownUser(e.to_string()))?
            .stdout
            .trim()
            .to_string();
        if user.is_empty() {
            return Err(PermissionError::UnknownUser("id -un printed nothing".to_string()));
        }
        if self.commands.is_empty() {
            tracing::warn!("no privileged commands found on PATH; skipping sudoers grant");
            return Ok(());
        }

        let staged = self.stage_grant(&user)?;
        if let Err(e) = self.install_staged(staged.path()) {
            return Err(PermissionError::Install {
                path: self.sudoers_path.clone(),
                cause: e.into(),
            });
        }
        drop(staged);

        self.active.store(true, Ordering::SeqCst);
        tracing::debug!("installed temporary sudoers grant at {}", self.sudoers_path.display());
        Ok(())
    }

    /// Write the grant to a fresh, exclusively created 0600 file.
    ///
    /// The file is removed when the handle drops, so it must outlive the
    /// copy into place.
    fn stage_grant(&self, user: &str) -> Result<NamedTempFile, PermissionError> {
        let stage_err = |source| PermissionError::Stage {
            path: self.staging_dir.clone(),
            source,
        };
        let mut staged = tempfile::Builder::new()
            .prefix(STAGED_PREFIX)
            .suffix(".sudoers")
            .tempfile_in(&self.staging_dir)
            .map_err(stage_err)?;
        staged
            .write_all(self.render_grant(user).as_bytes())
            .and_then(|()| staged.as_file().sync_all())
            .map_err(stage_err)?;
        Ok(staged)
    }

    fn install_staged(&self, staged: &Path) -> Result<()> {
        let staged: &str = &staged.to_string_lossy();
        let dest: &str = &self.sudoers_path.to_string_lossy();
        self.executor.run("sudo", &["visudo", "-cf", staged])?;
        self.executor.run(
            "sudo",
            &["install", "-m", "0440", "-o", "root", "-g", "root", staged, dest],
        )?;
        Ok(())
    }

    /// Remove the grant if this manager installed it. No-op otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`PermissionError::Cleanup`] if removal fails; the grant is
    /// still considered active so a later call can retry.
    pub fn cleanup_permissions(&self) -> Result<(), PermissionError> {
        if !self.is_active() {
            return Ok(());
        }
        let dest: &str = &self.sudoers_path.to_string_lossy();
        self.executor
            .run("sudo", &["rm", "-f", dest])
            .map_err(|e| PermissionError::Cleanup {
                path: self.sudoers_path.clone(),
                cause: e.into(),
            })?;
        self.active.store(false, Ordering::SeqCst);
        tracing::debug!("removed temporary sudoers grant");
        Ok(())
    }

    /// Run one command under `sudo`, dropping a redundant leading `sudo`.
    ///
    /// # Errors
    ///
    /// Returns an error if `command` is empty or the command fails.
    pub fn execute_with_sudo(&self, command: &[&str]) -> Result<ExecResult> {
        sudo(self.executor.as_ref(), command)
    }

    /// Open an elevation bracket.
    ///
    /// Setup failure is logged and the bracket proceeds in degraded mode
    /// (each privileged command prompts). If a bracket is already open the
    /// returned guard does not own it.
    #[must_use]
    pub fn bracket(self: &Arc<Self>) -> ElevationGuard {
        if self.is_active() {
            return ElevationGuard {
                manager: Arc::clone(self),
                owner: false,
            };
        }
        if let Err(e) = self.setup_temporary_permissions() {
            tracing::warn!("{e}; privileged commands will prompt individually");
        }
        ElevationGuard {
            manager: Arc::clone(self),
            owner: true,
        }
    }
}

/// Removes the grant on drop if it opened it.
#[derive(Debug)]
pub struct ElevationGuard {
    manager: Arc<PrivilegeManager>,
    owner: bool,
}

impl ElevationGuard {
    /// Whether dropping this guard tears the grant down.
    #[must_use]
    pub const fn is_owner(&self) -> bool {
        self.owner
    }
}

impl Drop for ElevationGuard {
    fn drop(&mut self) {
        if self.owner
            && let Err(e) = self.manager.cleanup_permissions()
        {
            tracing::warn!("{e}");
        }
    }
}

fn sudo(executor: &dyn Executor, command: &[&str]) -> Result<ExecResult> {
    let args = match command {
        ["sudo", rest @ ..] => rest,
        _ => command,
    };
    if args.is_empty() {
        bail!("no command given to run with sudo");
    }
    executor.run("sudo", args)
}

/// Run `command` elevated, through `privilege` when one is attached.
///
/// # Errors
///
/// Returns an error if the command fails.
pub fn run_elevated(
    executor: &dyn Executor,
    privilege: Option<&PrivilegeManager>,
    command: &[&str],
) -> Result<ExecResult> {
    privilege.map_or_else(|| sudo(executor, command), |p| p.execute_with_sudo(command))
}

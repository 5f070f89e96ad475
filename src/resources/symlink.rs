//! Symlink Manager: links dotfiles into place, backing up whatever was there.
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::helpers::fs::{ensure_parent_dir, path_occupied, with_suffix};
use crate::config::{SymlinkMapping, Template, template_scope_matches};
use crate::error::SymlinkError;
use crate::exec::Executor;
use crate::privilege::{PrivilegeManager, run_elevated};

/// Whether `target` is a symlink whose link value is exactly `source`.
#[must_use]
pub fn is_valid_symlink(source: &Path, target: &Path) -> bool {
    std::fs::read_link(target).is_ok_and(|link| link.as_os_str() == source.as_os_str())
}

/// First unused backup name for `target`: `.bak`, then `.bak1`, `.bak2`, ...
#[must_use]
pub fn backup_path(target: &Path) -> PathBuf {
    let first = with_suffix(target, ".bak");
    if !path_occupied(&first) {
        return first;
    }
    (1u64..)
        .map(|n| with_suffix(target, &format!(".bak{n}")))
        .find(|candidate| !path_occupied(candidate))
        .unwrap_or(first)
}

/// Mappings applying to `template`: unscoped ones and those listing it.
#[must_use]
pub fn filter_mappings_by_template<'a>(
    mappings: &'a [SymlinkMapping],
    template: &str,
) -> Vec<&'a SymlinkMapping> {
    mappings
        .iter()
        .filter(|m| template_scope_matches(m.template.as_deref(), template))
        .collect()
}

/// [`filter_mappings_by_template`] plus mappings whose source the template
/// lists explicitly. Artifact order is kept.
#[must_use]
pub fn select_mappings<'a>(
    mappings: &'a [SymlinkMapping],
    template: &Template,
) -> Vec<&'a SymlinkMapping> {
    mappings
        .iter()
        .filter(|m| m.applies_to(&template.name) || template.symlinks.contains(&m.source))
        .collect()
}

/// Outcome of a [`SymlinkManager::create_symlinks`] batch.
#[derive(Debug, Default)]
pub struct SymlinkReport {
    /// Links created this run.
    pub created: Vec<PathBuf>,
    /// Conflicting paths moved aside, as `(target, backup)`.
    pub backups: Vec<(PathBuf, PathBuf)>,
    /// Links that were already correct.
    pub skipped: usize,
    /// Links a dry run would have created.
    pub planned: Vec<PathBuf>,
    /// Per-mapping failures, keyed by mapping source.
    pub failed: Vec<(String, SymlinkError)>,
}

/// Creates links for mappings, with optional elevation for system paths.
pub struct SymlinkManager {
    root: PathBuf,
    home: PathBuf,
    executor: Arc<dyn Executor>,
    privilege: Option<Arc<PrivilegeManager>>,
    dry_run: bool,
    skipped: Arc<AtomicUsize>,
}

impl fmt::Debug for SymlinkManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SymlinkManager")
            .field("root", &self.root)
            .field("home", &self.home)
            .field("dry_run", &self.dry_run)
            .field("skipped", &self.skipped_count())
            .finish_non_exhaustive()
    }
}

/// What happened to one link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkOutcome {
    /// The link already pointed at the source.
    AlreadyCorrect,
    /// The link was created, after moving a conflicting path to `backup`.
    Created {
        /// Where the previous occupant went.
        backup: Option<PathBuf>,
    },
    /// Dry run: the link would have been created.
    Planned,
}

impl SymlinkManager {
    /// Manager linking sources under `root` into targets under `home`.
    #[must_use]
    pub fn new(
        root: impl Into<PathBuf>,
        home: impl Into<PathBuf>,
        executor: Arc<dyn Executor>,
    ) -> Self {
        Self {
            root: root.into(),
            home: home.into(),
            executor,
            privilege: None,
            dry_run: false,
            skipped: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Run elevated steps through `privilege`.
    #[must_use]
    pub fn with_privilege(mut self, privilege: Option<Arc<PrivilegeManager>>) -> Self {
        self.privilege = privilege;
        self
    }

    /// Only report what would change.
    #[must_use]
    pub const fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Count already-correct links into `counter`, shared with other managers.
    #[must_use]
    pub fn with_skip_counter(mut self, counter: Arc<AtomicUsize>) -> Self {
        self.skipped = counter;
        self
    }

    /// Links found already correct, across every manager sharing the counter.
    #[must_use]
    pub fn skipped_count(&self) -> usize {
        self.skipped.load(Ordering::Relaxed)
    }

    /// Ensure `target` is a symlink to `source`.
    ///
    /// A conflicting file, directory, or symlink at `target` is renamed to
    /// [`backup_path`] first, never deleted. With `requires_sudo` the rename,
    /// parent creation, and link run through `sudo`.
    ///
    /// # Errors
    ///
    /// Returns a [`SymlinkError`] if the source is missing or any step fails.
    pub fn create_symlink(
        &self,
        source: &Path,
        target: &Path,
        requires_sudo: bool,
    ) -> Result<LinkOutcome, SymlinkError> {
        if is_valid_symlink(source, target) {
            self.skipped.fetch_add(1, Ordering::Relaxed);
            tracing::debug!("{} already links to {}", target.display(), source.display());
            return Ok(LinkOutcome::AlreadyCorrect);
        }
        if !source.exists() {
            return Err(SymlinkError::SourceMissing {
                path: source.to_path_buf(),
            });
        }

        let backup = path_occupied(target).then(|| backup_path(target));
        if self.dry_run {
            match &backup {
                Some(b) => tracing::info!(
                    target: "provision::dry_run",
                    "would move {} to {} and link it to {}",
                    target.display(),
                    b.display(),
                    source.display()
                ),
                None => tracing::info!(
                    target: "provision::dry_run",
                    "would link {} -> {}",
                    target.display(),
                    source.display()
                ),
            }
            return Ok(LinkOutcome::Planned);
        }

        if let Some(backup) = &backup {
            self.move_aside(target, backup, requires_sudo)
                .map_err(|cause| SymlinkError::Backup {
                    target: target.to_path_buf(),
                    backup: backup.clone(),
                    cause,
                })?;
            tracing::info!("backed up {} to {}", target.display(), backup.display());
        }

        self.link(source, target, requires_sudo)
            .map_err(|cause| SymlinkError::Create {
                target: target.to_path_buf(),
                link_to: source.to_path_buf(),
                cause,
            })?;
        tracing::debug!("linked {} -> {}", target.display(), source.display());
        Ok(LinkOutcome::Created { backup })
    }

    fn move_aside(
        &self,
        target: &Path,
        backup: &Path,
        requires_sudo: bool,
    ) -> Result<(), crate::error::Cause> {
        if requires_sudo {
            let from: &str = &target.to_string_lossy();
            let to: &str = &backup.to_string_lossy();
            self.elevated(&["mv", from, to])
        } else {
            std::fs::rename(target, backup).map_err(Into::into)
        }
    }

    fn link(
        &self,
        source: &Path,
        target: &Path,
        requires_sudo: bool,
    ) -> Result<(), crate::error::Cause> {
        if requires_sudo {
            let source: &str = &source.to_string_lossy();
            let link: &str = &target.to_string_lossy();
            if let Some(parent) = target.parent() {
                let parent: &str = &parent.to_string_lossy();
                self.elevated(&["mkdir", "-p", parent])?;
            }
            self.elevated(&["ln", "-s", source, link])
        } else {
            ensure_parent_dir(target)?;
            std::os::unix::fs::symlink(source, target).map_err(Into::into)
        }
    }

    fn elevated(&self, command: &[&str]) -> Result<(), crate::error::Cause> {
        run_elevated(self.executor.as_ref(), self.privilege.as_deref(), command)
            .map(|_| ())
            .map_err(Into::into)
    }

    /// Apply `mappings` filtered to `template` with [`filter_mappings_by_template`].
    pub fn create_symlinks(&self, mappings: &[SymlinkMapping], template: &str) -> SymlinkReport {
        self.apply_all(&filter_mappings_by_template(mappings, template))
    }

    /// Apply each mapping in order. A failure is recorded and the rest continue.
    pub fn apply_all(&self, mappings: &[&SymlinkMapping]) -> SymlinkReport {
        let mut report = SymlinkReport::default();
        for mapping in mappings {
            let source = mapping.source_path(&self.root);
            let target = mapping.target_path(&self.home);
            match self.create_symlink(&source, &target, mapping.requires_sudo) {
                Ok(LinkOutcome::AlreadyCorrect) => report.skipped += 1,
                Ok(LinkOutcome::Planned) => report.planned.push(target),
                Ok(LinkOutcome::Created { backup }) => {
                    if let Some(backup) = backup {
                        report.backups.push((target.clone(), backup));
                    }
                    report.created.push(target);
                }
                Err(e) => {
                    tracing::warn!("symlink {}: {e}", mapping.source);
                    report.failed.push((mapping.source.clone(), e));
                }
            }
        }
        report
    }
}

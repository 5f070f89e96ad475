//! Package Resolver/Installer: generic package names to platform installs.
use std::fmt;
use std::time::Duration;

use crate::config::{ConfigStore, PackageDefinitions};
use crate::error::PackageError;
use crate::exec::Executor;
use crate::platform::PlatformHandler;
use crate::retry::with_retry;

/// Resolve `generic` to the platform packages listed under `key`.
///
/// An unknown name or a definition without `key` resolves to nothing; that
/// is logged as a warning, never an error.
#[must_use]
pub fn map_package_to_platform(
    generic: &str,
    key: &str,
    definitions: &PackageDefinitions,
) -> Vec<String> {
    let Some(definition) = definitions.get(generic) else {
        tracing::warn!("package '{generic}' has no definition");
        return Vec::new();
    };
    let resolved = definition.packages_for(key);
    if resolved.is_empty() {
        tracing::warn!("package '{generic}' is not defined for {key}");
    }
    resolved.to_vec()
}

/// How often installed state is re-queried after an install command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifyPolicy {
    /// Queries before giving up (at least one).
    pub attempts: u32,
    /// Pause between queries.
    pub delay: Duration,
}

impl Default for VerifyPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_secs(1),
        }
    }
}

/// What [`PackageInstaller::install_package`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageOutcome {
    /// Every resolved package was already present.
    AlreadyInstalled,
    /// The package was installed and verified.
    Installed,
    /// Nothing is defined for this platform.
    Unresolved,
    /// Dry run: these platform packages would be installed.
    WouldInstall(Vec<String>),
}

/// Per-package results of [`PackageInstaller::install_template`].
#[derive(Debug, Default)]
pub struct TemplateReport {
    /// Template that was installed.
    pub template: String,
    /// Generic names installed this run.
    pub installed: Vec<String>,
    /// Generic names that were already present.
    pub already_installed: Vec<String>,
    /// Generic names with nothing defined for the platform.
    pub unresolved: Vec<String>,
    /// Dry run: generic names that would be installed.
    pub planned: Vec<String>,
    /// Recoverable failures, in template order.
    pub failed: Vec<PackageError>,
}

impl TemplateReport {
    fn new(template: &str) -> Self {
        Self {
            template: template.to_string(),
            ..Self::default()
        }
    }

    /// Whether every package succeeded or needed nothing.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Installs generic packages through a [`PlatformHandler`].
pub struct PackageInstaller<'a> {
    store: &'a ConfigStore,
    handler: &'a dyn PlatformHandler,
    executor: &'a dyn Executor,
    verify: VerifyPolicy,
    dry_run: bool,
}

impl fmt::Debug for PackageInstaller<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PackageInstaller")
            .field("platform", &self.handler.platform())
            .field("verify", &self.verify)
            .field("dry_run", &self.dry_run)
            .finish_non_exhaustive()
    }
}

impl<'a> PackageInstaller<'a> {
    /// Installer reading definitions from `store`; hooks run through `executor`.
    #[must_use]
    pub fn new(
        store: &'a ConfigStore,
        handler: &'a dyn PlatformHandler,
        executor: &'a dyn Executor,
    ) -> Self {
        Self {
            store,
            handler,
            executor,
            verify: VerifyPolicy::default(),
            dry_run: false,
        }
    }

    /// Override the post-install verification policy.
    #[must_use]
    pub const fn with_verify(mut self, verify: VerifyPolicy) -> Self {
        self.verify = verify;
        self
    }

    /// Only report what would be installed.
    #[must_use]
    pub const fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    fn platform_key(&self) -> Result<&'static str, PackageError> {
        self.handler.platform().key().ok_or(PackageError::UnsupportedPlatform)
    }

    fn resolve(&self, generic: &str) -> Result<(Vec<String>, Vec<String>), PackageError> {
        let key = self.platform_key()?;
        let definitions = self.store.load_package_definitions()?;
        let resolved = map_package_to_platform(generic, key, &definitions);
        let hooks = definitions
            .get(generic)
            .map(|d| d.post_install.clone())
            .unwrap_or_default();
        Ok((resolved, hooks))
    }

    fn all_present(&self, resolved: &[String]) -> bool {
        !resolved.is_empty() && resolved.iter().all(|p| self.handler.is_package_installed(p))
    }

    /// Whether every platform package `generic` resolves to is installed.
    ///
    /// Nothing resolved counts as not installed.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform is unknown or the definitions cannot be loaded.
    pub fn is_package_installed(&self, generic: &str) -> Result<bool, PackageError> {
        let (resolved, _) = self.resolve(generic)?;
        Ok(self.all_present(&resolved))
    }

    /// Install one generic package, verify it, then run its hooks.
    ///
    /// # Errors
    ///
    /// Returns a recoverable [`PackageError`] when the install command, the
    /// verification, or a hook fails; a non-recoverable one when the platform
    /// is unknown or the definitions cannot be loaded.
    pub fn install_package(&self, generic: &str) -> Result<PackageOutcome, PackageError> {
        let (resolved, hooks) = self.resolve(generic)?;
        if resolved.is_empty() {
            return Ok(PackageOutcome::Unresolved);
        }
        if self.all_present(&resolved) {
            tracing::info!("{generic} is already installed");
            return Ok(PackageOutcome::AlreadyInstalled);
        }

        if self.dry_run {
            let missing: Vec<String> = resolved
                .iter()
                .filter(|p| !self.handler.is_package_installed(p))
                .cloned()
                .collect();
            tracing::info!(
                target: "provision::dry_run",
                "would install {generic} ({}) with {}",
                missing.join(", "),
                self.handler.package_manager_command()
            );
            return Ok(PackageOutcome::WouldInstall(missing));
        }

        tracing::info!("installing {generic} ({})", resolved.join(", "));
        self.handler
            .install_packages(&resolved)
            .map_err(|e| PackageError::InstallFailed {
                package: generic.to_string(),
                source: e.into(),
            })?;

        with_retry(
            || {
                if self.all_present(&resolved) {
                    Ok(())
                } else {
                    Err(PackageError::VerificationFailed {
                        package: generic.to_string(),
                        resolved: resolved.clone(),
                    })
                }
            },
            &format!("verifying {generic}"),
            self.verify.attempts,
            self.verify.delay,
        )?;

        for command in &hooks {
            tracing::debug!("running post-install hook for {generic}: {command}");
            self.executor
                .run("sh", &["-c", command.as_str()])
                .map_err(|e| PackageError::HookFailed {
                    package: generic.to_string(),
                    command: command.clone(),
                    source: e.into(),
                })?;
        }
        tracing::info!("installed {generic}");
        Ok(PackageOutcome::Installed)
    }

    /// Install every package of template `name`, in order.
    ///
    /// A recoverable failure is logged and collected; installation moves on
    /// to the next package.
    ///
    /// # Errors
    ///
    /// Returns [`PackageError::Template`] when the template cannot be loaded
    /// or a non-recoverable error stops installation.
    pub fn install_template(&self, name: &str) -> Result<TemplateReport, PackageError> {
        let wrap = |source: PackageError| PackageError::Template {
            template: name.to_string(),
            source: Box::new(source),
        };
        let template = self
            .store
            .load_template(name)
            .map_err(|e| wrap(PackageError::Config(e)))?;
        self.platform_key().map_err(wrap)?;

        let mut report = TemplateReport::new(name);
        for generic in &template.packages {
            match self.install_package(generic) {
                Ok(PackageOutcome::Installed) => report.installed.push(generic.clone()),
                Ok(PackageOutcome::AlreadyInstalled) => {
                    report.already_installed.push(generic.clone());
                }
                Ok(PackageOutcome::Unresolved) => report.unresolved.push(generic.clone()),
                Ok(PackageOutcome::WouldInstall(_)) => report.planned.push(generic.clone()),
                Err(e) if e.is_recoverable() => {
                    tracing::warn!("{e}");
                    report.failed.push(e);
                }
                Err(e) => return Err(wrap(e)),
            }
        }

        if report.is_clean() {
            tracing::info!("template '{name}' packages installed");
        } else {
            tracing::info!(
                "template '{name}' finished with {} package failure(s)",
                report.failed.len()
            );
        }
        Ok(report)
    }
}

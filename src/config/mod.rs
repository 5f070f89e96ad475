//! Configuration Store: loads, validates, and caches the declarative artifacts.
//!
//! Artifacts live under `<root>/config/`:
//!
//! - `templates/<name>.json`: one [`Template`] per file
//! - `packages.json`: [`PackageDefinitions`]
//! - `symlinks.json`: array of [`SymlinkMapping`]
//! - `post-install.json`: array of [`PostInstallTask`] (optional)
//!
//! Every artifact is validated field-by-field before it is deserialized, and
//! cached for the lifetime of the [`ConfigStore`] until [`ConfigStore::clear_cache`].
pub mod json_loader;
pub mod packages;
pub mod symlinks;
pub mod tasks;
pub mod templates;
pub mod validation;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub use packages::{PackageDefinition, PackageDefinitions};
pub use symlinks::SymlinkMapping;
pub use tasks::PostInstallTask;
pub use templates::{DEFAULT_TEMPLATE, KNOWN_TEMPLATES, PRIVATE_TEMPLATE, Template};
pub use validation::{ValidationIssue, ValidationWarning};

use crate::error::ConfigError;

/// Directory under the dotfiles root holding all artifacts.
pub const CONFIG_DIR: &str = "config";

#[derive(Debug, Default)]
struct Cache {
    templates: HashMap<String, Arc<Template>>,
    packages: Option<Arc<PackageDefinitions>>,
    symlinks: Option<Arc<Vec<SymlinkMapping>>>,
    tasks: Option<Arc<Vec<PostInstallTask>>>,
}

/// Loads artifacts lazily and caches them until explicitly cleared.
///
/// Constructed once per run and shared by handle; there is no global state.
#[derive(Debug)]
pub struct ConfigStore {
    root: PathBuf,
    config_dir: PathBuf,
    cache: Mutex<Cache>,
}

impl ConfigStore {
    /// Create a store for the dotfiles repository at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let config_dir = root.join(CONFIG_DIR);
        Self {
            root,
            config_dir,
            cache: Mutex::new(Cache::default()),
        }
    }

    /// Dotfiles repository root; symlink sources are relative to it.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the artifacts.
    #[must_use]
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    fn templates_dir(&self) -> PathBuf {
        self.config_dir.join("templates")
    }

    fn cache(&self) -> MutexGuard<'_, Cache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Load the template called `name`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the template file is missing, unreadable,
    /// malformed, or fails validation.
    pub fn load_template(&self, name: &str) -> Result<Arc<Template>, ConfigError> {
        if let Some(template) = self.cache().templates.get(name) {
            return Ok(Arc::clone(template));
        }

        let label = format!("template.{name}");
        let path = self.templates_dir().join(format!("{name}.json"));
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return Err(ConfigError::Invalid {
                artifact: label.clone(),
                path,
                issues: vec![ValidationIssue::new(label, "invalid template name")],
            });
        }

        let template: Template = json_loader::load_required(&path, &label, |value| {
            validation::validate_template(value, &label)
        })?;
        if template.name != name {
            tracing::warn!(
                "template file {} declares name '{}'",
                path.display(),
                template.name
            );
        }

        let template = Arc::new(template);
        self.cache()
            .templates
            .insert(name.to_string(), Arc::clone(&template));
        Ok(template)
    }

    /// Load all package definitions.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if `packages.json` is missing, unreadable,
    /// malformed, or fails validation.
    pub fn load_package_definitions(&self) -> Result<Arc<PackageDefinitions>, ConfigError> {
        if let Some(packages) = &self.cache().packages {
            return Ok(Arc::clone(packages));
        }

        let definitions: PackageDefinitions = json_loader::load_required(
            &self.config_dir.join("packages.json"),
            "packages",
            validation::validate_package_definitions,
        )?;

        let definitions = Arc::new(definitions);
        self.cache().packages = Some(Arc::clone(&definitions));
        Ok(definitions)
    }

    /// Load all symlink mappings.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if `symlinks.json` is missing, unreadable,
    /// malformed, or fails validation.
    pub fn load_symlink_mappings(&self) -> Result<Arc<Vec<SymlinkMapping>>, ConfigError> {
        if let Some(mappings) = &self.cache().symlinks {
            return Ok(Arc::clone(mappings));
        }

        let mappings: Vec<SymlinkMapping> = json_loader::load_required(
            &self.config_dir.join("symlinks.json"),
            "symlinks",
            validation::validate_symlink_mappings,
        )?;

        let mappings = Arc::new(mappings);
        self.cache().symlinks = Some(Arc::clone(&mappings));
        Ok(mappings)
    }

    /// Load all post-install tasks. A missing file yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if `post-install.json` exists but is
    /// unreadable, malformed, or fails validation.
    pub fn load_post_install_tasks(&self) -> Result<Arc<Vec<PostInstallTask>>, ConfigError> {
        if let Some(tasks) = &self.cache().tasks {
            return Ok(Arc::clone(tasks));
        }

        let tasks: Vec<PostInstallTask> = json_loader::load_validated(
            &self.config_dir.join("post-install.json"),
            "post-install",
            validation::validate_post_install_tasks,
        )?
        .unwrap_or_default();

        let tasks = Arc::new(tasks);
        self.cache().tasks = Some(Arc::clone(&tasks));
        Ok(tasks)
    }

    /// Whether a template file exists, without loading it.
    #[must_use]
    pub fn has_template(&self, name: &str) -> bool {
        self.templates_dir().join(format!("{name}.json")).is_file()
    }

    /// Names of all template files present, sorted.
    #[must_use]
    pub fn template_names(&self) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(self.templates_dir()) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .filter_map(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .collect();
        names.sort();
        names
    }

    /// Validate the known templates and every other artifact.
    ///
    /// Keeps going after the first failure so that one run reports every
    /// problem.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationFailed`] listing all issues if any
    /// artifact failed to load.
    pub fn validate_all(&self) -> Result<(), ConfigError> {
        let mut issues = Vec::new();

        for name in KNOWN_TEMPLATES {
            if let Err(e) = self.load_template(name) {
                issues.extend(e.into_issues());
            }
        }
        if let Err(e) = self.load_package_definitions() {
            issues.extend(e.into_issues());
        }
        if let Err(e) = self.load_symlink_mappings() {
            issues.extend(e.into_issues());
        }
        if let Err(e) = self.load_post_install_tasks() {
            issues.extend(e.into_issues());
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::ValidationFailed { issues })
        }
    }

    /// Cross-artifact consistency warnings for one template.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if any artifact fails to load.
    pub fn cross_reference_warnings(
        &self,
        template: &str,
    ) -> Result<Vec<ValidationWarning>, ConfigError> {
        let template = self.load_template(template)?;
        let definitions = self.load_package_definitions()?;
        let mappings = self.load_symlink_mappings()?;
        let tasks = self.load_post_install_tasks()?;
        Ok(validation::cross_reference_warnings(
            &self.root,
            &template,
            &definitions,
            &mappings,
            &tasks,
        ))
    }

    /// Drop every cached artifact; the next load re-reads from disk.
    pub fn clear_cache(&self) {
        *self.cache() = Cache::default();
    }
}

/// `None` applies to every template; a list applies to its members only.
#[must_use]
pub fn template_scope_matches(scope: Option<&[String]>, template: &str) -> bool {
    scope.is_none_or(|names| names.iter().any(|n| n == template))
}

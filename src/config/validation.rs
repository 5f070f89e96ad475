//! Schema validation of raw configuration artifacts and cross-reference checks.
//!
//! Each `validate_*` function walks a parsed [`serde_json::Value`] and reports
//! every problem it finds as a [`ValidationIssue`] with a dotted path, rather
//! than stopping at the first one the way typed deserialization would.
use std::fmt;
use std::path::Path;

use serde_json::{Map, Value};

use super::packages::PackageDefinitions;
use super::symlinks::SymlinkMapping;
use super::tasks::PostInstallTask;
use super::templates::Template;

/// A single schema violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// Dotted path to the offending value (e.g. `template.personal.packages`).
    pub path: String,
    /// Human-readable message.
    pub message: String,
}

impl ValidationIssue {
    /// Issue at dotted `path`.
    #[must_use]
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// A non-fatal inconsistency between artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationWarning {
    /// The artifact the warning was raised for (e.g. "template.desktop").
    pub source: String,
    /// The specific item that triggered the warning.
    pub item: String,
    /// Human-readable warning message.
    pub message: String,
}

impl ValidationWarning {
    /// Warning about `item` raised while checking `source`.
    #[must_use]
    pub fn new(
        source: impl Into<String>,
        item: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            item: item.into(),
            message: message.into(),
        }
    }
}

/// Collects issues under a common path prefix.
struct Checker<'a> {
    prefix: String,
    issues: &'a mut Vec<ValidationIssue>,
}

impl<'a> Checker<'a> {
    fn new(prefix: impl Into<String>, issues: &'a mut Vec<ValidationIssue>) -> Self {
        Self {
            prefix: prefix.into(),
            issues,
        }
    }

    fn push(&mut self, field: &str, message: &str) {
        let path = if field.is_empty() {
            self.prefix.clone()
        } else {
            format!("{}.{field}", self.prefix)
        };
        self.issues.push(ValidationIssue::new(path, message));
    }

    fn object<'v>(&mut self, value: &'v Value) -> Option<&'v Map<String, Value>> {
        let obj = value.as_object();
        if obj.is_none() {
            self.push("", "expected object");
        }
        obj
    }

    fn required_string(&mut self, obj: &Map<String, Value>, field: &str, message: &str) {
        match obj.get(field) {
            Some(Value::String(s)) if !s.trim().is_empty() => {}
            None | Some(Value::Null | Value::String(_)) => self.push(field, message),
            Some(_) => self.push(field, "expected string"),
        }
    }

    fn optional_string(&mut self, obj: &Map<String, Value>, field: &str) {
        if let Some(v) = obj.get(field)
            && !v.is_string()
            && !v.is_null()
        {
            self.push(field, "expected string");
        }
    }

    fn optional_bool(&mut self, obj: &Map<String, Value>, field: &str) {
        if let Some(v) = obj.get(field)
            && !v.is_boolean()
            && !v.is_null()
        {
            self.push(field, "expected boolean");
        }
    }

    /// Check `field` is an array of strings. Returns the element count when it is.
    fn string_array(
        &mut self,
        obj: &Map<String, Value>,
        field: &str,
        required: bool,
    ) -> Option<usize> {
        match obj.get(field) {
            None | Some(Value::Null) => {
                if required {
                    self.push(field, "expected array of strings");
                }
                None
            }
            Some(Value::Array(items)) => {
                for (i, item) in items.iter().enumerate() {
                    if !item.is_string() {
                        self.push(&format!("{field}.{i}"), "expected string");
                    }
                }
                Some(items.len())
            }
            Some(_) => {
                self.push(field, "expected array of strings");
                None
            }
        }
    }

    /// Check `field` is a string or an array of strings. Returns whether it is present.
    fn string_or_array(&mut self, obj: &Map<String, Value>, field: &str) -> bool {
        match obj.get(field) {
            None | Some(Value::Null) => false,
            Some(Value::String(_)) => true,
            Some(Value::Array(_)) => {
                self.string_array(obj, field, true);
                true
            }
            Some(_) => {
                self.push(field, "expected string or array of strings");
                true
            }
        }
    }
}

/// Validate a template artifact. `label` is the path prefix, e.g. `template.desktop`.
#[must_use]
pub fn validate_template(value: &Value, label: &str) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    let mut check = Checker::new(label, &mut issues);
    let Some(obj) = check.object(value) else {
        return issues;
    };

    check.required_string(obj, "name", "Template name is required");
    check.required_string(obj, "description", "Template description is required");
    if check.string_array(obj, "packages", true) == Some(0) {
        check.push("packages", "At least one package is required");
    }
    check.string_array(obj, "symlinks", true);
    check.string_array(obj, "postInstallTasks", true);
    check.optional_bool(obj, "requiresPrivatePackages");
    issues
}

/// Validate the package-definitions artifact (a map of generic name to definition).
#[must_use]
pub fn validate_package_definitions(value: &Value) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    let Some(map) = Checker::new("packages", &mut issues).object(value) else {
        return issues;
    };

    for (name, definition) in map {
        let mut check = Checker::new(format!("packages.{name}"), &mut issues);
        let Some(obj) = check.object(definition) else {
            continue;
        };
        let has_arch = check.string_or_array(obj, "arch");
        let has_ubuntu = check.string_or_array(obj, "ubuntu");
        if !has_arch && !has_ubuntu {
            check.push(
                "distribution",
                "Package must have at least one distribution definition (arch or ubuntu)",
            );
        }
        check.optional_string(obj, "description");
        check.string_array(obj, "postInstall", false);
    }
    issues
}

/// Validate the symlink-mappings artifact (an array of mappings).
#[must_use]
pub fn validate_symlink_mappings(value: &Value) -> Vec<ValidationIssue> {
    validate_array(value, "symlinks", |check, obj| {
        check.required_string(obj, "source", "Source path is required");
        check.required_string(obj, "target", "Target path is required");
        check.optional_bool(obj, "requiresSudo");
        check.string_array(obj, "template", false);
    })
}

/// Validate the post-install-tasks artifact (an array of tasks).
#[must_use]
pub fn validate_post_install_tasks(value: &Value) -> Vec<ValidationIssue> {
    validate_array(value, "post-install", |check, obj| {
        check.required_string(obj, "name", "Task name is required");
        check.required_string(obj, "command", "Command is required");
        check.optional_string(obj, "description");
        check.string_array(obj, "template", false);
        check.optional_bool(obj, "requiresSudo");
    })
}

fn validate_array(
    value: &Value,
    label: &str,
    mut validate_item: impl FnMut(&mut Checker<'_>, &Map<String, Value>),
) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    let Some(items) = value.as_array() else {
        issues.push(ValidationIssue::new(label, "expected array"));
        return issues;
    };

    for (i, item) in items.iter().enumerate() {
        let mut check = Checker::new(format!("{label}.{i}"), &mut issues);
        if let Some(obj) = check.object(item) {
            validate_item(&mut check, obj);
        }
    }
    issues
}

/// Report references between artifacts that do not resolve.
///
/// These never block a run: a template package without a definition is
/// skipped with a warning at install time, and so on.
#[must_use]
pub fn cross_reference_warnings(
    root: &Path,
    template: &Template,
    definitions: &PackageDefinitions,
    mappings: &[SymlinkMapping],
    tasks: &[PostInstallTask],
) -> Vec<ValidationWarning> {
    let source = format!("template.{}", template.name);
    let mut warnings = Vec::new();

    for package in &template.packages {
        if !definitions.contains_key(package) {
            warnings.push(ValidationWarning::new(
                &source,
                package,
                "package has no definition in packages.json",
            ));
        }
    }

    for name in &template.post_install_tasks {
        if !tasks.iter().any(|t| &t.name == name) {
            warnings.push(ValidationWarning::new(
                &source,
                name,
                "post-install task is not defined in post-install.json",
            ));
        }
    }

    for link in &template.symlinks {
        if !mappings.iter().any(|m| &m.source == link) {
            warnings.push(ValidationWarning::new(
                &source,
                link,
                "symlink is not defined in symlinks.json",
            ));
        }
    }

    for mapping in mappings.iter().filter(|m| m.applies_to(&template.name)) {
        if !root.join(&mapping.source).exists() {
            warnings.push(ValidationWarning::new(
                "symlinks",
                &mapping.source,
                "source does not exist in the dotfiles root",
            ));
        }
    }

    warnings
}

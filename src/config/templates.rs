//! Template artifacts: named installation profiles.
use serde::Deserialize;

/// Templates every complete configuration is expected to provide.
pub const KNOWN_TEMPLATES: &[&str] = &["headless", "desktop", "personal"];

/// Template used when none is requested.
pub const DEFAULT_TEMPLATE: &str = "headless";

/// Template holding the packages installed by the private-packages step.
pub const PRIVATE_TEMPLATE: &str = "private";

/// A named installation profile selecting packages, symlinks, and tasks.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    /// Template name (e.g. `desktop`).
    pub name: String,
    /// One-line description shown by the interactive picker.
    pub description: String,
    /// Generic package names, installed in order.
    pub packages: Vec<String>,
    /// Mapping sources pulled in regardless of their own template scope.
    pub symlinks: Vec<String>,
    /// Post-install task names pulled in regardless of their own template scope.
    pub post_install_tasks: Vec<String>,
    /// Whether the private-packages step should run for this template.
    #[serde(default)]
    pub requires_private_packages: bool,
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_camel_case_fields() {
        let template: Template = serde_json::from_str(
            r#"{
                "name": "personal",
                "description": "Personal desktop",
                "packages": ["base", "desktop"],
                "symlinks": [".zshrc"],
                "postInstallTasks": ["bat-cache"],
                "requiresPrivatePackages": true
            }"#,
        )
        .unwrap();
        assert_eq!(template.packages, vec!["base", "desktop"]);
        assert_eq!(template.post_install_tasks, vec!["bat-cache"]);
        assert!(template.requires_private_packages);
    }

    #[test]
    fn private_packages_default_to_false() {
        let template: Template = serde_json::from_str(
            r#"{"name":"headless","description":"d","packages":["base"],"symlinks":[],"postInstallTasks":[]}"#,
        )
        .unwrap();
        assert!(!template.requires_private_packages);
    }

    #[test]
    fn default_template_is_known() {
        assert!(KNOWN_TEMPLATES.contains(&DEFAULT_TEMPLATE));
    }
}

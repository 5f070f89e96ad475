//! Post-install task definitions.
use serde::Deserialize;

/// A shell command run after packages and symlinks are in place.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostInstallTask {
    /// Unique task name.
    pub name: String,
    /// Command line passed to `sh -c`.
    pub command: String,
    /// Optional description for logs.
    #[serde(default)]
    pub description: Option<String>,
    /// Templates this task is limited to; `None` means every template.
    #[serde(default)]
    pub template: Option<Vec<String>>,
    /// Run the command with elevated privilege.
    #[serde(default)]
    pub requires_sudo: bool,
}

impl PostInstallTask {
    /// Whether the task applies to `template`.
    #[must_use]
    pub fn applies_to(&self, template: &str) -> bool {
        super::template_scope_matches(self.template.as_deref(), template)
    }
}

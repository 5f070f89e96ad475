//! Symlink mappings: dotfiles-root sources linked to home or system targets.
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// One source to target pairing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymlinkMapping {
    /// Path relative to the dotfiles root.
    pub source: String,
    /// Absolute, `~/`-prefixed, or home-relative destination.
    pub target: String,
    /// Create the link (and any backup) with elevated privilege.
    #[serde(default)]
    pub requires_sudo: bool,
    /// Templates this mapping is limited to; `None` means every template.
    #[serde(default)]
    pub template: Option<Vec<String>>,
}

impl SymlinkMapping {
    /// Whether the mapping applies to `template`.
    #[must_use]
    pub fn applies_to(&self, template: &str) -> bool {
        super::template_scope_matches(self.template.as_deref(), template)
    }

    /// Absolute path of the source under `root`.
    #[must_use]
    pub fn source_path(&self, root: &Path) -> PathBuf {
        root.join(&self.source)
    }

    /// Absolute path of the target, expanding `~` and home-relative paths.
    #[must_use]
    pub fn target_path(&self, home: &Path) -> PathBuf {
        expand_home(&self.target, home)
    }
}

/// Resolve `~`, `~/rest`, and relative paths against `home`.
#[must_use]
pub fn expand_home(path: &str, home: &Path) -> PathBuf {
    if path == "~" {
        return home.to_path_buf();
    }
    if let Some(rest) = path.strip_prefix("~/") {
        return home.join(rest);
    }
    let p = Path::new(path);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        home.join(p)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_with_defaults() {
        let m: SymlinkMapping =
            serde_json::from_str(r#"{"source": ".zshrc", "target": "~/.zshrc"}"#).unwrap();
        assert!(!m.requires_sudo);
        assert!(m.template.is_none());
        assert!(m.applies_to("anything"));
    }

    #[test]
    fn template_scope_limits_applicability() {
        let m: SymlinkMapping = serde_json::from_str(
            r#"{"source": "hypr", "target": ".config/hypr", "template": ["desktop", "personal"]}"#,
        )
        .unwrap();
        assert!(m.applies_to("desktop"));
        assert!(!m.applies_to("headless"));
    }

    #[test]
    fn expand_home_variants() {
        let home = Path::new("/home/u");
        assert_eq!(expand_home("~", home), PathBuf::from("/home/u"));
        assert_eq!(expand_home("~/.zshrc", home), PathBuf::from("/home/u/.zshrc"));
        assert_eq!(
            expand_home(".config/nvim", home),
            PathBuf::from("/home/u/.config/nvim")
        );
        assert_eq!(expand_home("/etc/keyd", home), PathBuf::from("/etc/keyd"));
    }

    #[test]
    fn source_path_joins_root() {
        let m = SymlinkMapping {
            source: ".config/bat".to_string(),
            target: "~/.config/bat".to_string(),
            requires_sudo: false,
            template: None,
        };
        assert_eq!(
            m.source_path(Path::new("/dots")),
            PathBuf::from("/dots/.config/bat")
        );
    }
}

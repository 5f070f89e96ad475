//! Package definitions: generic names mapped to platform package lists.
use std::collections::BTreeMap;

use serde::Deserialize;

/// All package definitions, keyed by generic package name.
pub type PackageDefinitions = BTreeMap<String, PackageDefinition>;

/// Platform packages for one generic name.
///
/// Both platform keys are normalized to lists at load time; an absent key, an
/// empty string, or an empty array all become an empty list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "RawPackageDefinition")]
pub struct PackageDefinition {
    /// Arch-family packages.
    pub arch: Vec<String>,
    /// Debian-family packages.
    pub ubuntu: Vec<String>,
    /// Optional free-form description.
    pub description: Option<String>,
    /// Shell commands to run after the package is first installed.
    pub post_install: Vec<String>,
}

impl PackageDefinition {
    /// Packages for a platform key (`arch` or `ubuntu`); empty for any other key.
    #[must_use]
    pub fn packages_for(&self, key: &str) -> &[String] {
        match key {
            "arch" => self.arch.as_slice(),
            "ubuntu" => self.ubuntu.as_slice(),
            _ => &[],
        }
    }
}

/// A single string or a list of strings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn into_vec(self) -> Vec<String> {
        let items = match self {
            Self::One(item) => vec![item],
            Self::Many(items) => items,
        };
        items
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPackageDefinition {
    arch: Option<OneOrMany>,
    ubuntu: Option<OneOrMany>,
    description: Option<String>,
    #[serde(default)]
    post_install: Vec<String>,
}

impl From<RawPackageDefinition> for PackageDefinition {
    fn from(raw: RawPackageDefinition) -> Self {
        Self {
            arch: raw.arch.map(OneOrMany::into_vec).unwrap_or_default(),
            ubuntu: raw.ubuntu.map(OneOrMany::into_vec).unwrap_or_default(),
            description: raw.description,
            post_install: raw.post_install,
        }
    }
}

//! JSON artifact reading with schema validation before typed deserialization.
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::Path;

use super::validation::ValidationIssue;
use crate::error::ConfigError;

/// Read and parse a JSON artifact.
///
/// Returns `Ok(None)` when the file does not exist so that callers can decide
/// whether absence is fatal.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] if the file exists but cannot be read and
/// [`ConfigError::Syntax`] if it is not valid JSON.
pub fn read_json(path: &Path, artifact: &str) -> Result<Option<Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        artifact: artifact.to_string(),
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_str(&content)
        .map(Some)
        .map_err(|source| ConfigError::Syntax {
            artifact: artifact.to_string(),
            path: path.to_path_buf(),
            source,
        })
}

/// Read an artifact, run `validate` over the raw JSON, then deserialize.
///
/// All issues reported by `validate` are surfaced together in one
/// [`ConfigError::Invalid`]. Returns `Ok(None)` for a missing file.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the file cannot be read, is not valid JSON,
/// or fails validation.
pub fn load_validated<T: DeserializeOwned>(
    path: &Path,
    artifact: &str,
    validate: impl FnOnce(&Value) -> Vec<ValidationIssue>,
) -> Result<Option<T>, ConfigError> {
    let Some(value) = read_json(path, artifact)? else {
        return Ok(None);
    };

    let issues = validate(&value);
    if !issues.is_empty() {
        return Err(ConfigError::Invalid {
            artifact: artifact.to_string(),
            path: path.to_path_buf(),
            issues,
        });
    }

    serde_json::from_value(value)
        .map(Some)
        .map_err(|e| ConfigError::Invalid {
            artifact: artifact.to_string(),
            path: path.to_path_buf(),
            issues: vec![ValidationIssue::new(artifact, e.to_string())],
        })
}

/// Like [`load_validated`] but a missing file is a [`ConfigError::NotFound`].
///
/// # Errors
///
/// Returns a [`ConfigError`] if the file is missing, unreadable, malformed,
/// or invalid.
pub fn load_required<T: DeserializeOwned>(
    path: &Path,
    artifact: &str,
    validate: impl FnOnce(&Value) -> Vec<ValidationIssue>,
) -> Result<T, ConfigError> {
    load_validated(path, artifact, validate)?.ok_or_else(|| ConfigError::NotFound {
        artifact: artifact.to_string(),
        path: path.to_path_buf(),
    })
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::config::test_helpers::write_temp_json;

    #[test]
    fn read_missing_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let value = read_json(&dir.path().join("absent.json"), "symlinks").unwrap();
        assert!(value.is_none());
    }

    #[test]
    fn read_malformed_is_syntax_error() {
        let (_dir, path) = write_temp_json("{ not json");
        let err = read_json(&path, "packages").unwrap_err();
        assert!(matches!(err, ConfigError::Syntax { .. }));
        assert!(err.to_string().contains("packages"));
    }

    #[test]
    fn load_required_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_required::<Vec<String>>(&dir.path().join("x.json"), "symlinks", |_| {
            Vec::new()
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }));
    }

    #[test]
    fn validation_issues_are_reported_together() {
        let (_dir, path) = write_temp_json("[1, 2]");
        let err = load_validated::<Vec<String>>(&path, "list", |_| {
            vec![
                ValidationIssue::new("list.0", "expected string"),
                ValidationIssue::new("list.1", "expected string"),
            ]
        })
        .unwrap_err();
        let ConfigError::Invalid { issues, .. } = err else {
            panic!("expected Invalid");
        };
        assert_eq!(issues.len(), 2);
    }

    #[test]
    fn valid_artifact_deserializes() {
        let (_dir, path) = write_temp_json(r#"["a", "b"]"#);
        let items: Vec<String> = load_required(&path, "list", |_| Vec::new()).unwrap();
        assert_eq!(items, vec!["a", "b"]);
    }
}

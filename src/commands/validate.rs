//! Validate command: load every artifact and report what is wrong with it.
use anyhow::Result;

use crate::cli::GlobalOpts;
use crate::config::ConfigStore;
use crate::logging::Logger;

/// Run the validate command.
///
/// # Errors
///
/// Returns the aggregated [`ConfigError`](crate::error::ConfigError) if any
/// artifact is invalid.
pub fn run(global: &GlobalOpts, log: &Logger) -> Result<()> {
    let store = super::open_store(global, log)?;
    validate(&store, log)
}

/// Validate `store`, logging each issue and the cross-reference warnings of
/// every template present.
///
/// # Errors
///
/// Returns the aggregated [`ConfigError`](crate::error::ConfigError) if any
/// artifact is invalid.
pub fn validate(store: &ConfigStore, log: &Logger) -> Result<()> {
    log.stage("Validating configuration");
    if let Err(e) = store.validate_all() {
        let issues = e.into_issues();
        for issue in &issues {
            log.error(&issue.to_string());
        }
        return Err(crate::error::ConfigError::ValidationFailed { issues }.into());
    }

    let templates = store.template_names();
    log.info(&format!("{} template(s) found", templates.len()));
    for name in &templates {
        super::install::report_warnings(store, name, log);
    }
    log.info("configuration is valid");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::test_helpers::ConfigFixture;
    use crate::error::{ErrorKind, kind_of};

    fn complete() -> ConfigFixture {
        ConfigFixture::new()
            .simple_template("headless", &["base"])
            .simple_template("desktop", &["base"])
            .simple_template("personal", &["base"])
            .packages(r#"{"base":{"arch":["git"],"ubuntu":["git"]}}"#)
            .symlinks("[]")
    }

    #[test]
    fn complete_repository_is_valid() {
        let config = complete();
        validate(&config.store(), &Logger::new("test")).unwrap();
    }

    #[test]
    fn reports_every_problem_as_configuration_error() {
        let config = ConfigFixture::new()
            .simple_template("headless", &["base"])
            .packages(r#"{"base":{}}"#)
            .symlinks(r#"[{"source": ""}]"#);
        let err = validate(&config.store(), &Logger::new("test")).unwrap_err();
        assert_eq!(kind_of(&err), Some(ErrorKind::Configuration));
        let message = err.to_string();
        assert!(message.contains("template.desktop"), "{message}");
        assert!(message.contains("packages.base.distribution"), "{message}");
        assert!(message.contains("Target path is required"), "{message}");
    }
}

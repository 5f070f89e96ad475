//! Standard home directory layout.
use anyhow::{Context as _, Result};

use super::{Context, Step, Task, TaskResult};

/// Directories created under the home directory.
pub const HOME_DIRECTORIES: &[&str] = &[
    ".config",
    ".local/bin",
    "code/clones",
    "code/projects",
    "code/sandbox",
];

/// Create the standard home directory layout.
#[derive(Debug)]
pub struct CreateDirectories;

impl Task for CreateDirectories {
    fn name(&self) -> &'static str {
        "Create directories"
    }

    fn step(&self) -> Step {
        Step::Directories
    }

    fn should_run(&self, _ctx: &Context) -> bool {
        true
    }

    fn run(&self, ctx: &Context) -> Result<TaskResult> {
        let missing: Vec<_> = HOME_DIRECTORIES
            .iter()
            .map(|rel| ctx.home.join(rel))
            .filter(|path| !path.is_dir())
            .collect();
        if missing.is_empty() {
            return Ok(TaskResult::Skipped("all directories exist".to_string()));
        }

        for path in &missing {
            if ctx.dry_run {
                ctx.log.dry_run(&format!("would create {}", path.display()));
                continue;
            }
            std::fs::create_dir_all(path)
                .with_context(|| format!("creating {}", path.display()))?;
            ctx.log.debug(&format!("created {}", path.display()));
        }

        if ctx.dry_run {
            return Ok(TaskResult::DryRun);
        }
        ctx.log.info(&format!("{} directories created", missing.len()));
        Ok(TaskResult::Ok)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::tasks::test_helpers::TaskFixture;

    #[test]
    fn creates_every_directory_then_skips() {
        let f = TaskFixture::new();
        std::fs::create_dir(f.home_path(".config")).unwrap();
        assert_eq!(CreateDirectories.run(&f.context()).unwrap(), TaskResult::Ok);
        for rel in HOME_DIRECTORIES {
            assert!(f.home_path(rel).is_dir(), "{rel} missing");
        }
        assert!(matches!(
            CreateDirectories.run(&f.context()).unwrap(),
            TaskResult::Skipped(_)
        ));
    }

    #[test]
    fn dry_run_creates_nothing() {
        let f = TaskFixture::new();
        let ctx = f.context().with_dry_run(true);
        assert_eq!(CreateDirectories.run(&ctx).unwrap(), TaskResult::DryRun);
        assert!(!f.home_path("code").exists());
    }
}

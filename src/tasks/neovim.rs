//! Neovim configuration checkout.
use std::path::Path;

use anyhow::{Context as _, Result};

use super::{Context, Step, Task, TaskResult};
use crate::resources::helpers::fs::{ensure_parent_dir, path_occupied};
use crate::resources::symlink::backup_path;

/// Neovim configuration sources.
pub const NVIM_CONFIG_REPO: &str = "https://github.com/knownasnaffy/nvim.git";

/// Substring identifying a checkout of [`NVIM_CONFIG_REPO`] by its remote URL.
const NVIM_CONFIG_SLUG: &str = "knownasnaffy/nvim";

/// What currently sits at the configuration directory.
#[derive(Debug, PartialEq, Eq)]
enum Checkout {
    Missing,
    Current,
    Foreign,
}

fn inspect(ctx: &Context, dir: &Path) -> Checkout {
    if !path_occupied(dir) {
        return Checkout::Missing;
    }
    if !dir.join(".git").exists() {
        return Checkout::Foreign;
    }
    let dir_str: &str = &dir.to_string_lossy();
    match ctx
        .executor
        .run_unchecked("git", &["-C", dir_str, "remote", "get-url", "origin"])
    {
        Ok(out) if out.success && out.stdout.contains(NVIM_CONFIG_SLUG) => Checkout::Current,
        _ => Checkout::Foreign,
    }
}

/// Clone the Neovim configuration into `$XDG_CONFIG_HOME/nvim`.
///
/// An existing directory that is not a checkout of [`NVIM_CONFIG_REPO`] is
/// moved aside to a `.bak` path first.
#[derive(Debug)]
pub struct InstallNeovimConfig;

impl Task for InstallNeovimConfig {
    fn name(&self) -> &'static str {
        "Install Neovim configuration"
    }

    fn step(&self) -> Step {
        Step::Neovim
    }

    fn should_run(&self, ctx: &Context) -> bool {
        ctx.executor.which("git")
    }

    fn run(&self, ctx: &Context) -> Result<TaskResult> {
        let dir = ctx.config_dir().join("nvim");
        let state = inspect(ctx, &dir);
        if state == Checkout::Current {
            return Ok(TaskResult::Skipped(format!(
                "{} already tracks {NVIM_CONFIG_SLUG}",
                dir.display()
            )));
        }

        if ctx.dry_run {
            if state == Checkout::Foreign {
                ctx.log.dry_run(&format!(
                    "would move {} to {}",
                    dir.display(),
                    backup_path(&dir).display()
                ));
            }
            ctx.log
                .dry_run(&format!("would clone {NVIM_CONFIG_REPO} into {}", dir.display()));
            return Ok(TaskResult::DryRun);
        }

        if state == Checkout::Foreign {
            let backup = backup_path(&dir);
            std::fs::rename(&dir, &backup)
                .with_context(|| format!("moving {} aside", dir.display()))?;
            ctx.log
                .info(&format!("moved existing {} to {}", dir.display(), backup.display()));
        }

        ensure_parent_dir(&dir)?;
        let dir_str: &str = &dir.to_string_lossy();
        ctx.executor
            .run("git", &["clone", NVIM_CONFIG_REPO, dir_str])
            .with_context(|| format!("cloning {NVIM_CONFIG_REPO}"))?;
        Ok(TaskResult::Ok)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::exec::test_helpers::ScriptedExecutor;
    use crate::tasks::test_helpers::TaskFixture;

    fn git_fixture(exec: ScriptedExecutor) -> TaskFixture {
        TaskFixture::new().with_exec(exec.with_program("git"))
    }

    fn stage_checkout(f: &TaskFixture) -> std::path::PathBuf {
        let dir = f.home_path(".config/nvim");
        std::fs::create_dir_all(dir.join(".git")).unwrap();
        std::fs::write(dir.join("init.lua"), "-- mine").unwrap();
        dir
    }

    #[test]
    fn should_run_requires_git() {
        let f = TaskFixture::new();
        assert!(!InstallNeovimConfig.should_run(&f.context()));
        let f = git_fixture(ScriptedExecutor::new());
        assert!(InstallNeovimConfig.should_run(&f.context()));
    }

    #[test]
    fn missing_config_is_cloned() {
        let f = git_fixture(ScriptedExecutor::new());
        assert_eq!(InstallNeovimConfig.run(&f.context()).unwrap(), TaskResult::Ok);
        let dir = f.home_path(".config/nvim");
        assert_eq!(
            f.exec.calls(),
            vec![format!("git clone {NVIM_CONFIG_REPO} {}", dir.display())]
        );
        assert!(f.home_path(".config").is_dir());
    }

    #[test]
    fn current_checkout_is_skipped() {
        let f = git_fixture(ScriptedExecutor::new());
        let dir = stage_checkout(&f);
        f.exec.push_rule(
            &format!("git -C {} remote get-url origin", dir.display()),
            true,
            "https://github.com/knownasnaffy/nvim.git\n",
        );
        let result = InstallNeovimConfig.run(&f.context()).unwrap();
        assert!(matches!(result, TaskResult::Skipped(_)));
        assert_eq!(f.exec.count("git clone"), 0);
    }

    #[test]
    fn foreign_checkout_is_moved_aside() {
        let f = git_fixture(ScriptedExecutor::new());
        let dir = stage_checkout(&f);
        f.exec.push_rule(
            &format!("git -C {} remote get-url origin", dir.display()),
            true,
            "https://github.com/someone/nvim-config.git\n",
        );
        assert_eq!(InstallNeovimConfig.run(&f.context()).unwrap(), TaskResult::Ok);

        let backup = f.home_path(".config/nvim.bak");
        assert_eq!(std::fs::read_to_string(backup.join("init.lua")).unwrap(), "-- mine");
        assert_eq!(f.exec.count("git clone"), 1);
    }

    #[test]
    fn plain_directory_is_moved_aside() {
        let f = git_fixture(ScriptedExecutor::new());
        let dir = f.home_path(".config/nvim");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("init.vim"), "set number").unwrap();
        assert_eq!(InstallNeovimConfig.run(&f.context()).unwrap(), TaskResult::Ok);

        assert!(f.home_path(".config/nvim.bak/init.vim").is_file());
        assert_eq!(f.exec.count("git -C"), 0, "no remote lookup outside a checkout");
        assert_eq!(f.exec.count("git clone"), 1);
    }

    #[test]
    fn failed_clone_fails_the_step() {
        let f = git_fixture(ScriptedExecutor::new().fail("git clone"));
        let err = InstallNeovimConfig.run(&f.context()).unwrap_err();
        assert!(format!("{err:#}").contains("cloning"));
    }

    #[test]
    fn dry_run_leaves_existing_config() {
        let f = git_fixture(ScriptedExecutor::new());
        let dir = stage_checkout(&f);
        let ctx = f.context().with_dry_run(true);
        assert_eq!(InstallNeovimConfig.run(&ctx).unwrap(), TaskResult::DryRun);
        assert!(dir.join("init.lua").is_file());
        assert!(!f.home_path(".config/nvim.bak").exists());
        assert_eq!(f.exec.count("git clone"), 0);
    }

    #[test]
    fn xdg_config_home_is_honored() {
        let f = git_fixture(ScriptedExecutor::new());
        let mut ctx = f.context();
        let xdg = f.home_path("xdg");
        ctx.xdg_config_home = Some(xdg.clone());
        InstallNeovimConfig.run(&ctx).unwrap();
        assert_eq!(
            f.exec.calls(),
            vec![format!("git clone {NVIM_CONFIG_REPO} {}", xdg.join("nvim").display())]
        );
    }
}

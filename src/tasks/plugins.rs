//! oh-my-zsh, zsh plugins, and the spaceship prompt.
use std::path::Path;

use anyhow::{Context as _, Result};

use super::{Context, Step, Task, TaskResult};
use crate::resources::symlink::LinkOutcome;

/// oh-my-zsh sources.
pub const OH_MY_ZSH_REPO: &str = "https://github.com/ohmyzsh/ohmyzsh.git";

/// Plugins cloned into `$ZSH_CUSTOM/plugins`, as `(name, repository)`.
pub const ZSH_PLUGINS: &[(&str, &str)] = &[
    ("zsh-autosuggestions", "https://github.com/zsh-users/zsh-autosuggestions"),
    (
        "zsh-history-substring-search",
        "https://github.com/zsh-users/zsh-history-substring-search",
    ),
    (
        "zsh-syntax-highlighting",
        "https://github.com/zsh-users/zsh-syntax-highlighting",
    ),
    ("zsh-completions", "https://github.com/zsh-users/zsh-completions"),
];

/// Spaceship prompt sources.
pub const SPACESHIP_REPO: &str = "https://github.com/spaceship-prompt/spaceship-prompt.git";

/// Clone `url` into `dest` unless it already exists. Returns whether a clone happened.
fn clone_once(ctx: &Context, url: &str, dest: &Path, extra: &[&str]) -> Result<bool> {
    if dest.exists() {
        ctx.log
            .debug(&format!("{} already present, skipping", dest.display()));
        return Ok(false);
    }
    if ctx.dry_run {
        ctx.log
            .dry_run(&format!("would clone {url} into {}", dest.display()));
        return Ok(true);
    }
    let dest_str: &str = &dest.to_string_lossy();
    let mut args = vec!["clone", url, dest_str];
    args.extend_from_slice(extra);
    ctx.executor
        .run("git", &args)
        .with_context(|| format!("cloning {url}"))?;
    Ok(true)
}

/// Install oh-my-zsh, its plugins, and the spaceship prompt.
#[derive(Debug)]
pub struct InstallShellPlugins;

impl Task for InstallShellPlugins {
    fn name(&self) -> &'static str {
        "Install shell plugins"
    }

    fn step(&self) -> Step {
        Step::Plugins
    }

    fn should_run(&self, ctx: &Context) -> bool {
        ctx.executor.which("git")
    }

    fn run(&self, ctx: &Context) -> Result<TaskResult> {
        let zsh_dir = ctx.home.join(".oh-my-zsh");
        let custom = zsh_dir.join("custom");
        let mut changed = usize::from(clone_once(ctx, OH_MY_ZSH_REPO, &zsh_dir, &[])?);

        for (name, url) in ZSH_PLUGINS {
            let dest = custom.join("plugins").join(name);
            changed += usize::from(clone_once(ctx, url, &dest, &[])?);
        }

        let spaceship = custom.join("themes/spaceship-prompt");
        let theme = custom.join("themes/spaceship.zsh-theme");
        let fresh = clone_once(ctx, SPACESHIP_REPO, &spaceship, &["--depth=1"])?;
        changed += usize::from(fresh);
        if ctx.dry_run {
            if fresh {
                ctx.log
                    .dry_run(&format!("would link {}", theme.display()));
            }
            return Ok(TaskResult::DryRun);
        }

        let outcome = ctx
            .symlink_manager()
            .create_symlink(&spaceship.join("spaceship.zsh-theme"), &theme, false)
            .context("linking spaceship theme")?;
        if matches!(outcome, LinkOutcome::Created { .. }) {
            changed += 1;
        }

        if changed == 0 {
            return Ok(TaskResult::Skipped("all plugins already installed".to_string()));
        }
        ctx.log.info(&format!("{changed} plugin change(s) applied"));
        Ok(TaskResult::Ok)
    }
}

//! Named provisioning steps run in a fixed order by the install command.
mod context;
pub mod directories;
pub mod neovim;
pub mod network;
pub mod packages;
pub mod plugins;
pub mod post_install;
pub mod shell;
pub mod symlinks;

pub use context::Context;

use std::fmt;

use anyhow::Result;

use crate::logging::TaskStatus;

/// Selectable install steps, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, clap::ValueEnum)]
pub enum Step {
    /// Set up systemd-networkd and check that the host is online.
    Network,
    /// Create the standard home directories.
    Directories,
    /// Bootstrap the package manager and install the template's packages.
    Programs,
    /// Make zsh the login shell.
    Shell,
    /// Install oh-my-zsh, its plugins, and the prompt theme.
    Plugins,
    /// Clone the Neovim configuration.
    Neovim,
    /// Link dotfiles into place.
    Symlinks,
    /// Run post-install commands.
    PostInstall,
    /// Install the private template's packages.
    PrivatePackages,
}

impl Step {
    /// Every step, in execution order.
    pub const ALL: [Self; 9] = [
        Self::Network,
        Self::Directories,
        Self::Programs,
        Self::Shell,
        Self::Plugins,
        Self::Neovim,
        Self::Symlinks,
        Self::PostInstall,
        Self::PrivatePackages,
    ];

    /// Command-line spelling of the step.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Directories => "directories",
            Self::Programs => "programs",
            Self::Shell => "shell",
            Self::Plugins => "plugins",
            Self::Neovim => "neovim",
            Self::Symlinks => "symlinks",
            Self::PostInstall => "post-install",
            Self::PrivatePackages => "private-packages",
        }
    }

    /// Whether this step survives `--only` and `--skip`.
    ///
    /// An empty `only` list selects every step.
    #[must_use]
    pub fn is_selected(self, only: &[Self], skip: &[Self]) -> bool {
        (only.is_empty() || only.contains(&self)) && !skip.contains(&self)
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a task that did not fail outright.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskResult {
    /// Everything the task set out to do is in place.
    Ok,
    /// The task finished but some items failed; the message says which.
    Partial(String),
    /// The task had nothing to do.
    Skipped(String),
    /// Dry run: changes were only reported.
    DryRun,
}

/// A named, executable step.
pub trait Task: Send + Sync {
    /// Human-readable task name.
    fn name(&self) -> &'static str;

    /// Step this task implements.
    fn step(&self) -> Step;

    /// Whether this task should run for the current template and host.
    fn should_run(&self, ctx: &Context) -> bool;

    /// Execute the task.
    ///
    /// # Errors
    ///
    /// Returns an error if the step cannot complete at all. Failures of
    /// individual packages, links, or commands are reported through
    /// [`TaskResult::Partial`] instead.
    fn run(&self, ctx: &Context) -> Result<TaskResult>;
}

/// The complete set of tasks run by the install command, in order.
#[must_use]
pub fn all_install_tasks() -> Vec<Box<dyn Task>> {
    vec![
        Box::new(network::SetupNetwork),
        Box::new(directories::CreateDirectories),
        Box::new(packages::InstallPrograms),
        Box::new(shell::ConfigureShell),
        Box::new(plugins::InstallShellPlugins),
        Box::new(neovim::InstallNeovimConfig),
        Box::new(symlinks::InstallSymlinks),
        Box::new(post_install::RunPostInstallTasks),
        Box::new(packages::InstallPrivatePackages),
    ]
}

/// Install tasks filtered by `--only` and `--skip`, order preserved.
#[must_use]
pub fn select_install_tasks(only: &[Step], skip: &[Step]) -> Vec<Box<dyn Task>> {
    all_install_tasks()
        .into_iter()
        .filter(|t| t.step().is_selected(only, skip))
        .collect()
}

/// Execute a task, recording the result in the logger.
pub fn execute(task: &dyn Task, ctx: &Context) {
    if !task.should_run(ctx) {
        ctx.log
            .debug(&format!("skipping task: {} (not applicable)", task.name()));
        ctx.log
            .record_task(task.name(), TaskStatus::NotApplicable, None);
        return;
    }

    ctx.log.stage(task.name());

    match task.run(ctx) {
        Ok(TaskResult::Ok) => {
            ctx.log.record_task(task.name(), TaskStatus::Ok, None);
        }
        Ok(TaskResult::Partial(detail)) => {
            ctx.log.warn(&format!("{}: {detail}", task.name()));
            ctx.log
                .record_task(task.name(), TaskStatus::Ok, Some(&detail));
        }
        Ok(TaskResult::Skipped(reason)) => {
            ctx.log.info(&format!("skipped: {reason}"));
            ctx.log
                .record_task(task.name(), TaskStatus::Skipped, Some(&reason));
        }
        Ok(TaskResult::DryRun) => {
            ctx.log.record_task(task.name(), TaskStatus::DryRun, None);
        }
        Err(e) => {
            ctx.log.error(&format!("{}: {e:#}", task.name()));
            ctx.log
                .record_task(task.name(), TaskStatus::Failed, Some(&format!("{e:#}")));
        }
    }
}

//! Dotfile symlink step.
use anyhow::Result;

use super::{Context, Step, Task, TaskResult};
use crate::resources::symlink::select_mappings;

/// Link dotfiles from the repository into the home directory.
#[derive(Debug)]
pub struct InstallSymlinks;

impl Task for InstallSymlinks {
    fn name(&self) -> &'static str {
        "Install symlinks"
    }

    fn step(&self) -> Step {
        Step::Symlinks
    }

    fn should_run(&self, _ctx: &Context) -> bool {
        true
    }

    fn run(&self, ctx: &Context) -> Result<TaskResult> {
        let mappings = ctx.store.load_symlink_mappings()?;
        let selected = select_mappings(&mappings, &ctx.template);
        if selected.is_empty() {
            return Ok(TaskResult::Skipped(format!(
                "no symlinks apply to template '{}'",
                ctx.template.name
            )));
        }
        ctx.log.debug(&format!("{} symlinks selected", selected.len()));

        let _elevation = selected
            .iter()
            .any(|m| m.requires_sudo)
            .then(|| ctx.elevate())
            .flatten();

        let report = ctx.symlink_manager().apply_all(&selected);

        for (target, backup) in &report.backups {
            ctx.log.info(&format!(
                "moved existing {} to {}",
                target.display(),
                backup.display()
            ));
        }
        if report.skipped > 0 {
            ctx.log
                .debug(&format!("{} symlink(s) already in place", report.skipped));
        }

        if !report.failed.is_empty() {
            let sources: Vec<&str> = report.failed.iter().map(|(s, _)| s.as_str()).collect();
            return Ok(TaskResult::Partial(format!(
                "{} symlink(s) failed: {}",
                sources.len(),
                sources.join(", ")
            )));
        }
        if ctx.dry_run {
            return Ok(TaskResult::DryRun);
        }
        ctx.log.info(&format!("{} symlinks created", report.created.len()));
        Ok(TaskResult::Ok)
    }
}

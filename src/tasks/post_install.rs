//! Post-install commands from `post-install.json`.
use anyhow::Result;

use super::{Context, Step, Task, TaskResult};
use crate::config::{PostInstallTask, Template};
use crate::privilege::run_elevated;

/// Tasks applying to `template`: scoped to it, unscoped, or named by it.
#[must_use]
pub fn select_tasks<'a>(
    tasks: &'a [PostInstallTask],
    template: &Template,
) -> Vec<&'a PostInstallTask> {
    tasks
        .iter()
        .filter(|t| t.applies_to(&template.name) || template.post_install_tasks.contains(&t.name))
        .collect()
}

/// Run the configured post-install commands.
#[derive(Debug)]
pub struct RunPostInstallTasks;

impl RunPostInstallTasks {
    fn run_one(ctx: &Context, task: &PostInstallTask) -> Result<()> {
        let script = task.command.as_str();
        if task.requires_sudo {
            run_elevated(ctx.executor.as_ref(), ctx.privilege.as_deref(), &["sh", "-c", script])?;
        } else {
            ctx.executor.run("sh", &["-c", script])?;
        }
        Ok(())
    }
}

impl Task for RunPostInstallTasks {
    fn name(&self) -> &'static str {
        "Run post-install tasks"
    }

    fn step(&self) -> Step {
        Step::PostInstall
    }

    fn should_run(&self, _ctx: &Context) -> bool {
        true
    }

    fn run(&self, ctx: &Context) -> Result<TaskResult> {
        let tasks = ctx.store.load_post_install_tasks()?;
        let selected = select_tasks(&tasks, &ctx.template);
        if selected.is_empty() {
            return Ok(TaskResult::Skipped("no post-install tasks".to_string()));
        }

        let _elevation = selected
            .iter()
            .any(|t| t.requires_sudo)
            .then(|| ctx.elevate())
            .flatten();

        let mut failed = Vec::new();
        for task in selected {
            let label = task.description.as_deref().unwrap_or(&task.name);
            if ctx.dry_run {
                ctx.log
                    .dry_run(&format!("would run {}: {}", task.name, task.command));
                continue;
            }
            ctx.log.info(label);
            if let Err(e) = Self::run_one(ctx, task) {
                ctx.log.warn(&format!("post-install task '{}' failed: {e:#}", task.name));
                failed.push(task.name.as_str());
            }
        }

        if !failed.is_empty() {
            return Ok(TaskResult::Partial(format!(
                "{} task(s) failed: {}",
                failed.len(),
                failed.join(", ")
            )));
        }
        if ctx.dry_run {
            return Ok(TaskResult::DryRun);
        }
        Ok(TaskResult::Ok)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::test_helpers::ConfigFixture;
    use crate::exec::test_helpers::ScriptedExecutor;
    use crate::tasks::test_helpers::TaskFixture;

    const TASKS: &str = r#"[
        {"name": "bat-cache", "command": "bat cache --build"},
        {"name": "keyd", "command": "systemctl enable keyd", "requiresSudo": true, "template": ["desktop"]},
        {"name": "browser", "command": "xdg-settings set default-web-browser qb.desktop", "template": ["desktop"]},
        {"name": "journal", "command": "jrnl --version", "template": ["personal"]}
    ]"#;

    fn fixture(exec: ScriptedExecutor) -> TaskFixture {
        TaskFixture::with_config(
            ConfigFixture::new()
                .template(
                    "headless",
                    r#"{"name":"headless","description":"d","packages":["base"],"symlinks":[],"postInstallTasks":["journal"]}"#,
                )
                .simple_template("desktop", &["base"])
                .packages(r#"{"base":{"arch":["git"]}}"#)
                .symlinks("[]")
                .tasks(TASKS),
        )
        .with_exec(exec)
    }

    #[test]
    fn selection_keeps_artifact_order() {
        let tasks: Vec<PostInstallTask> = serde_json::from_str(TASKS).unwrap();
        let f = fixture(ScriptedExecutor::new());
        let ctx = f.context();
        let names: Vec<&str> = select_tasks(&tasks, &ctx.template)
            .iter()
            .map(|t| t.name.as_str())
            .collect();
        assert_eq!(names, vec!["bat-cache", "journal"]);
    }

    #[test]
    fn elevated_tasks_use_sudo() {
        let f = fixture(ScriptedExecutor::new());
        assert_eq!(RunPostInstallTasks.run(&f.context_for("desktop")).unwrap(), TaskResult::Ok);
        assert_eq!(
            f.exec.calls(),
            vec![
                "sh -c bat cache --build",
                "sudo sh -c systemctl enable keyd",
                "sh -c xdg-settings set default-web-browser qb.desktop",
            ]
        );
    }

    #[test]
    fn failures_are_isolated() {
        let f = fixture(ScriptedExecutor::new().fail("sh -c bat"));
        let result = RunPostInstallTasks.run(&f.context_for("desktop")).unwrap();
        assert_eq!(result, TaskResult::Partial("1 task(s) failed: bat-cache".to_string()));
        assert_eq!(f.exec.count("sudo sh -c"), 1);
    }

    #[test]
    fn missing_artifact_means_nothing_to_do() {
        let f = TaskFixture::new();
        assert!(matches!(
            RunPostInstallTasks.run(&f.context()).unwrap(),
            TaskResult::Skipped(_)
        ));
    }

    #[test]
    fn dry_run_runs_nothing() {
        let f = fixture(ScriptedExecutor::new());
        let ctx = f.context().with_dry_run(true);
        assert_eq!(RunPostInstallTasks.run(&ctx).unwrap(), TaskResult::DryRun);
        assert!(f.exec.calls().is_empty());
    }
}

//! Login shell step.
use anyhow::{Context as _, Result, bail};

use super::{Context, Step, Task, TaskResult};
use crate::privilege::run_elevated;

/// Whether a `$SHELL` value names zsh.
fn is_zsh(shell: &str) -> bool {
    std::path::Path::new(shell)
        .file_name()
        .is_some_and(|name| name == "zsh")
}

/// Make zsh the login shell of the invoking user.
#[derive(Debug)]
pub struct ConfigureShell;

impl Task for ConfigureShell {
    fn name(&self) -> &'static str {
        "Configure default shell"
    }

    fn step(&self) -> Step {
        Step::Shell
    }

    fn should_run(&self, ctx: &Context) -> bool {
        ctx.executor.which("zsh")
    }

    fn run(&self, ctx: &Context) -> Result<TaskResult> {
        if ctx.login_shell.as_deref().is_some_and(is_zsh) {
            return Ok(TaskResult::Skipped("zsh is already the login shell".to_string()));
        }

        let zsh = ctx
            .executor
            .run("sh", &["-c", "command -v zsh"])
            .context("locating zsh")?
            .stdout
            .trim()
            .to_string();
        if zsh.is_empty() {
            bail!("zsh is on PATH but `command -v zsh` printed nothing");
        }
        let user = ctx
            .executor
            .run("id", &["-un"])
            .context("determining current user")?
            .stdout
            .trim()
            .to_string();

        if ctx.dry_run {
            ctx.log
                .dry_run(&format!("would change the login shell of {user} to {zsh}"));
            return Ok(TaskResult::DryRun);
        }

        run_elevated(
            ctx.executor.as_ref(),
            ctx.privilege.as_deref(),
            &["chsh", "-s", &zsh, &user],
        )
        .context("changing login shell")?;
        ctx.log.info(&format!("login shell set to {zsh}"));
        Ok(TaskResult::Ok)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::exec::test_helpers::ScriptedExecutor;
    use crate::tasks::test_helpers::TaskFixture;

    fn fixture() -> TaskFixture {
        TaskFixture::new().with_exec(
            ScriptedExecutor::new()
                .with_program("zsh")
                .ok("sh -c command -v zsh", "/usr/bin/zsh\n")
                .ok("id -un", "alice\n"),
        )
    }

    #[test]
    fn recognizes_zsh_paths() {
        assert!(is_zsh("/usr/bin/zsh"));
        assert!(is_zsh("zsh"));
        assert!(!is_zsh("/bin/bash"));
        assert!(!is_zsh("/usr/bin/zsh5"));
    }

    #[test]
    fn should_run_requires_zsh() {
        assert!(!ConfigureShell.should_run(&TaskFixture::new().context()));
        assert!(ConfigureShell.should_run(&fixture().context()));
    }

    #[test]
    fn changes_shell_when_not_zsh() {
        let f = fixture();
        assert_eq!(ConfigureShell.run(&f.context()).unwrap(), TaskResult::Ok);
        assert!(f.exec.calls().contains(&"sudo chsh -s /usr/bin/zsh alice".to_string()));
    }

    #[test]
    fn skips_when_already_zsh() {
        let f = fixture();
        let ctx = f.context().with_login_shell(Some("/usr/bin/zsh".to_string()));
        assert!(matches!(ConfigureShell.run(&ctx).unwrap(), TaskResult::Skipped(_)));
        assert!(f.exec.calls().is_empty());
    }

    #[test]
    fn dry_run_does_not_call_chsh() {
        let f = fixture();
        let ctx = f.context().with_dry_run(true);
        assert_eq!(ConfigureShell.run(&ctx).unwrap(), TaskResult::DryRun);
        assert_eq!(f.exec.count("sudo chsh"), 0);
    }
}

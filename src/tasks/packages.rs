//! Program and private package installation steps.
use anyhow::{Context as _, Result};

use super::{Context, Step, Task, TaskResult};
use crate::config::PRIVATE_TEMPLATE;
use crate::resources::package::{PackageInstaller, TemplateReport};

fn summarize(report: &TemplateReport, dry_run: bool) -> TaskResult {
    if !report.failed.is_empty() {
        let names: Vec<&str> = report.failed.iter().filter_map(|e| e.package()).collect();
        return TaskResult::Partial(format!(
            "{} package(s) failed: {}",
            names.len(),
            names.join(", ")
        ));
    }
    if dry_run {
        TaskResult::DryRun
    } else {
        TaskResult::Ok
    }
}

fn install_template(ctx: &Context, name: &str) -> Result<TemplateReport> {
    let handler = ctx.handler()?;
    let installer = PackageInstaller::new(&ctx.store, handler, ctx.executor.as_ref())
        .with_dry_run(ctx.dry_run);
    Ok(installer.install_template(name)?)
}

/// Refresh the index, bootstrap the package manager, and install the template's packages.
#[derive(Debug)]
pub struct InstallPrograms;

impl Task for InstallPrograms {
    fn name(&self) -> &'static str {
        "Install programs"
    }

    fn step(&self) -> Step {
        Step::Programs
    }

    fn should_run(&self, _ctx: &Context) -> bool {
        true
    }

    fn run(&self, ctx: &Context) -> Result<TaskResult> {
        let handler = ctx.handler()?;
        let _elevation = ctx.elevate();

        if ctx.dry_run {
            ctx.log.dry_run(&format!(
                "would refresh the package index and set up {}",
                handler.package_manager_command()
            ));
        } else {
            handler.update_system().context("updating package index")?;
            handler
                .setup_package_manager()
                .context("setting up package manager")?;
        }

        let report = install_template(ctx, &ctx.template.name)?;
        ctx.log.debug(&format!(
            "{} installed, {} already present, {} unresolved",
            report.installed.len(),
            report.already_installed.len(),
            report.unresolved.len()
        ));
        Ok(summarize(&report, ctx.dry_run))
    }
}

/// Install the packages of the `private` template.
#[derive(Debug)]
pub struct InstallPrivatePackages;

impl Task for InstallPrivatePackages {
    fn name(&self) -> &'static str {
        "Install private packages"
    }

    fn step(&self) -> Step {
        Step::PrivatePackages
    }

    fn should_run(&self, ctx: &Context) -> bool {
        ctx.force_private || ctx.template.requires_private_packages
    }

    fn run(&self, ctx: &Context) -> Result<TaskResult> {
        if !ctx.store.has_template(PRIVATE_TEMPLATE) {
            return Ok(TaskResult::Skipped(format!(
                "no '{PRIVATE_TEMPLATE}' template configured"
            )));
        }
        let _elevation = ctx.elevate();
        let report = install_template(ctx, PRIVATE_TEMPLATE)?;
        Ok(summarize(&report, ctx.dry_run))
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::test_helpers::ConfigFixture;
    use crate::exec::test_helpers::ScriptedExecutor;
    use crate::platform::{HandlerDeps, MockPlatformHandler, Platform, PlatformHandler, handler_for};
    use crate::tasks::test_helpers::TaskFixture;

    fn arch_context(f: &TaskFixture, mock: MockPlatformHandler) -> Context {
        f.context()
            .with_platform(Platform::Arch, Some(Arc::new(mock) as Arc<dyn PlatformHandler>))
    }

    fn quiet_mock() -> MockPlatformHandler {
        let mut mock = MockPlatformHandler::new();
        mock.expect_platform().return_const(Platform::Arch);
        mock.expect_package_manager_command().return_const("paru");
        mock
    }

    #[test]
    fn unknown_platform_fails_the_step() {
        let f = TaskFixture::new();
        let err = InstallPrograms.run(&f.context()).unwrap_err();
        assert!(err.to_string().contains("unsupported platform"));
    }

    #[test]
    fn update_failure_is_fatal() {
        let f = TaskFixture::new();
        let mut mock = quiet_mock();
        mock.expect_update_system()
            .times(1)
            .returning(|| Err(anyhow::anyhow!("mirror unreachable")));
        mock.expect_setup_package_manager().times(0);
        mock.expect_install_packages().times(0);
        let err = InstallPrograms.run(&arch_context(&f, mock)).unwrap_err();
        assert!(format!("{err:#}").contains("mirror unreachable"));
    }

    #[test]
    fn installs_template_packages_in_order() {
        let f = TaskFixture::new();
        let mut mock = quiet_mock();
        let mut seq = mockall::Sequence::new();
        mock.expect_update_system()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(()));
        mock.expect_setup_package_manager()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(()));
        mock.expect_is_package_installed().return_const(true);
        mock.expect_install_packages().times(0);
        assert_eq!(InstallPrograms.run(&arch_context(&f, mock)).unwrap(), TaskResult::Ok);
    }

    #[test]
    fn failed_package_is_partial_not_fatal() {
        let f = TaskFixture::new();
        let mut mock = quiet_mock();
        mock.expect_update_system().returning(|| Ok(()));
        mock.expect_setup_package_manager().returning(|| Ok(()));
        mock.expect_is_package_installed().return_const(false);
        mock.expect_install_packages()
            .returning(|_| Err(anyhow::anyhow!("paru exited 1")));
        let result = InstallPrograms.run(&arch_context(&f, mock)).unwrap();
        assert_eq!(result, TaskResult::Partial("1 package(s) failed: base".to_string()));
    }

    #[test]
    fn dry_run_touches_nothing() {
        let f = TaskFixture::new();
        let mut mock = quiet_mock();
        mock.expect_update_system().times(0);
        mock.expect_setup_package_manager().times(0);
        mock.expect_is_package_installed().return_const(false);
        mock.expect_install_packages().times(0);
        let ctx = arch_context(&f, mock).with_dry_run(true);
        assert_eq!(InstallPrograms.run(&ctx).unwrap(), TaskResult::DryRun);
    }

    #[test]
    fn elevation_bracket_wraps_install() {
        let f = TaskFixture::new().with_exec(
            ScriptedExecutor::new()
                .ok("id -un", "alice")
                .fail("pacman -Q")
                .with_program("paru"),
        );
        let exec = Arc::clone(&f.exec) as Arc<dyn crate::exec::Executor>;
        let privilege = f.privilege();
        let handler = handler_for(
            Platform::Arch,
            HandlerDeps::new(exec, Some(Arc::clone(&privilege)), f.home.path()),
        )
        .unwrap();
        let ctx = f
            .context()
            .with_platform(Platform::Arch, Some(Arc::from(handler)))
            .with_privilege(Some(Arc::clone(&privilege)));
        let _ = InstallPrograms.run(&ctx);

        let calls = f.exec.calls();
        let visudo: Vec<_> = calls.iter().filter(|c| c.starts_with("sudo visudo")).collect();
        assert_eq!(visudo.len(), 1, "nested bracket must not set up twice");
        let paru = calls.iter().position(|c| c.starts_with("paru -S")).unwrap();
        let cleanup = calls.iter().position(|c| c.starts_with("sudo rm -f")).unwrap();
        assert!(paru < cleanup);
        assert_eq!(f.exec.count("sudo rm -f"), 1);
        assert!(!privilege.is_active());
    }

    #[test]
    fn private_step_runs_only_when_requested() {
        let f = TaskFixture::new();
        assert!(!InstallPrivatePackages.should_run(&f.context()));
        assert!(InstallPrivatePackages.should_run(&f.context().with_force_private(true)));
    }

    #[test]
    fn private_step_skips_without_template() {
        let f = TaskFixture::new();
        let result = InstallPrivatePackages.run(&f.context()).unwrap();
        assert!(matches!(result, TaskResult::Skipped(ref r) if r.contains("private")));
    }

    #[test]
    fn private_step_installs_private_template() {
        let f = TaskFixture::with_config(
            ConfigFixture::new()
                .simple_template("headless", &["base"])
                .simple_template("private", &["journal"])
                .packages(r#"{"base":{"arch":["git"]},"journal":{"arch":["jrnl"]}}"#)
                .symlinks("[]"),
        );
        let installed = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let mut mock = quiet_mock();
        let query = Arc::clone(&installed);
        mock.expect_is_package_installed()
            .returning(move |_| query.load(std::sync::atomic::Ordering::SeqCst));
        let install = Arc::clone(&installed);
        mock.expect_install_packages()
            .withf(|names: &[String]| names.iter().map(String::as_str).eq(["jrnl"]))
            .times(1)
            .returning(move |_| {
                install.store(true, std::sync::atomic::Ordering::SeqCst);
                Ok(())
            });
        let ctx = arch_context(&f, mock).with_force_private(true);
        assert_eq!(InstallPrivatePackages.run(&ctx).unwrap(), TaskResult::Ok);
    }
}

// Shared helpers for integration tests.
//
// Provides a temporary-directory-backed dotfiles repository, a recording
// executor, and an in-memory platform handler so each integration test can
// run against an isolated environment without touching the host.
//
// Used by all integration test binaries that declare `mod common;`.
#![allow(dead_code)]

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use dotfiles_provision::config::ConfigStore;
use dotfiles_provision::exec::{ExecResult, Executor};
use dotfiles_provision::platform::{Platform, PlatformHandler};

/// The sample repository shipped with the crate.
pub fn sample_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("demos/sample")
}

fn template_json(name: &str, packages: &[&str]) -> String {
    let packages: Vec<String> = packages.iter().map(|p| format!("\"{p}\"")).collect();
    format!(
        r#"{{"name":"{name}","description":"{name} template","packages":[{}],"symlinks":[],"postInstallTasks":[]}}"#,
        packages.join(",")
    )
}

/// Write the minimal set of artifacts required by the configuration store
/// into `root`.
///
/// Creates:
/// - `config/templates/{headless,desktop,personal}.json` installing `base`
/// - `config/packages.json` defining `base` for both families
/// - `config/symlinks.json` with no mappings
pub fn setup_minimal_repo(root: &Path) {
    let templates = root.join("config/templates");
    std::fs::create_dir_all(&templates).expect("create templates dir");
    for name in ["headless", "desktop", "personal"] {
        std::fs::write(
            templates.join(format!("{name}.json")),
            template_json(name, &["base"]),
        )
        .expect("write template");
    }
    std::fs::write(
        root.join("config/packages.json"),
        r#"{"base":{"arch":["git"],"ubuntu":["git"]}}"#,
    )
    .expect("write packages.json");
    std::fs::write(root.join("config/symlinks.json"), "[]").expect("write symlinks.json");
}

/// An isolated test repository backed by a [`tempfile::TempDir`].
pub struct IntegrationTestContext {
    /// Temporary directory containing the test dotfiles repository.
    pub root: tempfile::TempDir,
    /// Temporary home directory links are created in.
    pub home: tempfile::TempDir,
}

impl IntegrationTestContext {
    /// Create a new context with a minimal but valid repository structure.
    pub fn new() -> Self {
        let root = tempfile::tempdir().expect("create temp dir");
        setup_minimal_repo(root.path());
        Self {
            root,
            home: tempfile::tempdir().expect("create home dir"),
        }
    }

    /// Path to the repository root.
    pub fn root_path(&self) -> &Path {
        self.root.path()
    }

    /// Path to the home directory.
    pub fn home_path(&self) -> &Path {
        self.home.path()
    }

    /// A fresh store over the repository.
    pub fn store(&self) -> ConfigStore {
        ConfigStore::new(self.root.path())
    }
}

/// Fluent builder for [`IntegrationTestContext`].
pub struct TestContextBuilder {
    ctx: IntegrationTestContext,
}

impl TestContextBuilder {
    /// Begin building a new context backed by a minimal repository.
    pub fn new() -> Self {
        Self {
            ctx: IntegrationTestContext::new(),
        }
    }

    /// Write `content` to `config/<filename>`, overwriting the minimal one.
    pub fn with_config_file(self, filename: &str, content: &str) -> Self {
        let path = self.ctx.root.path().join("config").join(filename);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create config parent");
        }
        std::fs::write(path, content).expect("write config file");
        self
    }

    /// Replace template `name` with one installing `packages`.
    pub fn with_template(self, name: &str, packages: &[&str]) -> Self {
        let json = template_json(name, packages);
        self.with_config_file(&format!("templates/{name}.json"), &json)
    }

    /// Create a source file under the repository root.
    pub fn with_source(self, source: &str, content: &str) -> Self {
        let path = self.ctx.root.path().join(source);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create source parent");
        }
        std::fs::write(&path, content).expect("write source file");
        self
    }

    /// Finish building and return the configured context.
    pub fn build(self) -> IntegrationTestContext {
        self.ctx
    }
}

/// Records every command line and succeeds, except for configured prefixes.
#[derive(Debug, Default)]
pub struct RecordingExecutor {
    calls: Mutex<Vec<String>>,
    failing: Vec<String>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every command line starting with `prefix`.
    pub fn failing(mut self, prefix: &str) -> Self {
        self.failing.push(prefix.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }

    fn record(&self, program: &str, args: &[&str]) -> anyhow::Result<ExecResult> {
        let line = std::iter::once(program)
            .chain(args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ");
        self.calls.lock().expect("calls lock").push(line.clone());
        if self.failing.iter().any(|p| line.starts_with(p.as_str())) {
            anyhow::bail!("{program} failed (exit 1)");
        }
        Ok(ExecResult {
            success: true,
            code: Some(0),
            ..ExecResult::default()
        })
    }
}

impl Executor for RecordingExecutor {
    fn run(&self, program: &str, args: &[&str]) -> anyhow::Result<ExecResult> {
        self.record(program, args)
    }

    fn run_in_with_env(
        &self,
        _dir: &Path,
        program: &str,
        args: &[&str],
        _env: &[(&str, &str)],
    ) -> anyhow::Result<ExecResult> {
        self.record(program, args)
    }

    fn run_unchecked(&self, program: &str, args: &[&str]) -> anyhow::Result<ExecResult> {
        self.record(program, args)
    }

    fn which(&self, _program: &str) -> bool {
        false
    }
}

/// In-memory package database standing in for pacman or apt.
#[derive(Debug)]
pub struct FakeHandler {
    platform: Platform,
    installed: Mutex<HashSet<String>>,
    broken: HashSet<String>,
    batches: Mutex<Vec<Vec<String>>>,
}

impl FakeHandler {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            installed: Mutex::new(HashSet::new()),
            broken: HashSet::new(),
            batches: Mutex::new(Vec::new()),
        }
    }

    /// Mark `names` as installed before the run.
    pub fn with_installed(self, names: &[&str]) -> Self {
        self.installed
            .lock()
            .expect("installed lock")
            .extend(names.iter().map(ToString::to_string));
        self
    }

    /// Make any batch containing `name` fail.
    pub fn with_broken(mut self, name: &str) -> Self {
        self.broken.insert(name.to_string());
        self
    }

    /// Every batch passed to `install_packages`, in order.
    pub fn batches(&self) -> Vec<Vec<String>> {
        self.batches.lock().expect("batches lock").clone()
    }
}

impl PlatformHandler for FakeHandler {
    fn platform(&self) -> Platform {
        self.platform
    }

    fn detect(&self) -> bool {
        true
    }

    fn package_manager_command(&self) -> &'static str {
        "fake"
    }

    fn update_system(&self) -> anyhow::Result<()> {
        Ok(())
    }

    fn setup_package_manager(&self) -> anyhow::Result<()> {
        Ok(())
    }

    fn is_package_installed(&self, name: &str) -> bool {
        self.installed.lock().expect("installed lock").contains(name)
    }

    fn install_packages(&self, names: &[String]) -> anyhow::Result<()> {
        self.batches
            .lock()
            .expect("batches lock")
            .push(names.to_vec());
        if let Some(name) = names.iter().find(|n| self.broken.contains(*n)) {
            anyhow::bail!("target not found: {name}");
        }
        self.installed
            .lock()
            .expect("installed lock")
            .extend(names.iter().cloned());
        Ok(())
    }
}

#![allow(clippy::expect_used, clippy::unwrap_used)]
//! Binary-level tests: argument handling, exit codes, and user-facing errors.

mod common;

use assert_cmd::Command;
use predicates::prelude::*;

use common::TestContextBuilder;

/// The binary with logging isolated to `cache`.
fn provision(cache: &tempfile::TempDir) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_provision"));
    cmd.env("XDG_CACHE_HOME", cache.path())
        .env_remove("RUST_LOG")
        .env_remove("DOTFILES_ROOT");
    cmd
}

#[test]
fn help_describes_the_tool() {
    let cache = tempfile::tempdir().unwrap();
    provision(&cache)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Configuration-driven Linux workstation provisioning",
        ));
}

#[test]
fn version_prints_name() {
    let cache = tempfile::tempdir().unwrap();
    provision(&cache)
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("provision "));
}

#[test]
fn conflicting_platform_flags_exit_non_zero() {
    let cache = tempfile::tempdir().unwrap();
    provision(&cache)
        .args(["--arch", "--debian", "--dry-run", "install"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains(
            "platform error: Conflicting distribution flags",
        ));
}

#[test]
fn ubuntu_alias_conflicts_too() {
    let cache = tempfile::tempdir().unwrap();
    provision(&cache)
        .args(["install", "--arch", "--ubuntu"])
        .assert()
        .failure();
}

#[test]
fn unknown_step_is_a_usage_error() {
    let cache = tempfile::tempdir().unwrap();
    provision(&cache)
        .args(["install", "--only", "fonts"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value 'fonts'"));
}

#[test]
fn validate_accepts_sample_repository() {
    let cache = tempfile::tempdir().unwrap();
    provision(&cache)
        .arg("--root")
        .arg(common::sample_root())
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("configuration is valid"));
}

#[test]
fn validate_reports_broken_repository() {
    let cache = tempfile::tempdir().unwrap();
    let ctx = TestContextBuilder::new()
        .with_config_file("symlinks.json", r#"[{"source": "zshrc"}]"#)
        .build();
    provision(&cache)
        .arg("--root")
        .arg(ctx.root_path())
        .arg("validate")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("symlinks.0.target: Target path is required"))
        .stderr(predicate::str::contains("configuration error"));
}

#[test]
fn unknown_template_is_a_configuration_error() {
    let cache = tempfile::tempdir().unwrap();
    let ctx = TestContextBuilder::new().build();
    provision(&cache)
        .arg("--root")
        .arg(ctx.root_path())
        .args(["--dry-run", "install", "--template", "gaming"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("configuration error"))
        .stderr(predicate::str::contains("template.gaming not found"));
}

#[test]
fn missing_root_is_reported() {
    let cache = tempfile::tempdir().unwrap();
    let cwd = tempfile::tempdir().unwrap();
    provision(&cache)
        .current_dir(cwd.path())
        .arg("validate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot determine dotfiles root"));
}

#[test]
fn completions_are_generated() {
    let cache = tempfile::tempdir().unwrap();
    provision(&cache)
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("provision"));
}

//! Configuration-driven Linux workstation provisioning.
//!
//! Reads declarative templates, package definitions, symlink mappings, and
//! post-install tasks from `config/` in a dotfiles repository, then brings an
//! Arch- or Debian-family host in line with the selected template.
//!
//! The public API is organised into four layers:
//!
//! - **[`config`]**: load, validate, and cache the JSON artifacts
//! - **[`resources`]**: idempotent primitives (package installer, symlink manager)
//! - **[`tasks`]**: the named install steps, run in a fixed order
//! - **[`commands`]**: top-level subcommand orchestration (`install`, `validate`)
//!
//! Host access goes through [`exec::Executor`], [`platform::PlatformHandler`],
//! and [`privilege::PrivilegeManager`].
#![deny(clippy::or_fun_call)]
#![deny(clippy::bool_to_int_with_if)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod exec;
pub mod logging;
pub mod platform;
pub mod privilege;
pub mod resources;
pub mod retry;
pub mod tasks;

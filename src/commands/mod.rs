//! Subcommand orchestration.
pub mod install;
pub mod validate;

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::cli::GlobalOpts;
use crate::config::{CONFIG_DIR, ConfigStore};
use crate::logging::Logger;
use crate::tasks::{self, Context, Task};

/// Environment variable naming the dotfiles root.
pub const ROOT_ENV: &str = "DOTFILES_ROOT";

/// Resolve the dotfiles root directory from CLI arguments or auto-detection.
///
/// # Errors
///
/// Returns an error if the root directory cannot be determined or doesn't exist.
pub fn resolve_root(global: &GlobalOpts) -> Result<PathBuf> {
    let cwd = std::env::current_dir()?;
    resolve_root_from(
        global.root.as_deref(),
        std::env::var_os(ROOT_ENV).map(PathBuf::from),
        &cwd,
    )
}

/// Root resolution with every input explicit: `--root`, then the
/// environment, then `cwd` when it holds a `config/` directory.
///
/// # Errors
///
/// Returns an error if no candidate applies or the chosen one is missing.
pub fn resolve_root_from(
    explicit: Option<&Path>,
    from_env: Option<PathBuf>,
    cwd: &Path,
) -> Result<PathBuf> {
    let candidate = match (explicit, from_env) {
        (Some(root), _) => root.to_path_buf(),
        (None, Some(root)) => root,
        (None, None) if cwd.join(CONFIG_DIR).is_dir() => cwd.to_path_buf(),
        (None, None) => anyhow::bail!(
            "cannot determine dotfiles root. Use --root or set {ROOT_ENV} env var"
        ),
    };
    dunce::canonicalize(&candidate).map_err(|e| {
        anyhow::anyhow!("dotfiles root {} is not accessible: {e}", candidate.display())
    })
}

/// Open the configuration store at the resolved root.
///
/// # Errors
///
/// Returns an error if the root cannot be resolved.
pub fn open_store(global: &GlobalOpts, log: &Logger) -> Result<ConfigStore> {
    let root = resolve_root(global)?;
    log.debug(&format!("dotfiles root: {}", root.display()));
    Ok(ConfigStore::new(root))
}

/// Execute every task in order, print the summary, and bail if any task failed.
///
/// # Errors
///
/// Returns an error if one or more tasks recorded a failure.
pub fn run_tasks_to_completion<'a>(
    tasks: impl IntoIterator<Item = &'a dyn Task>,
    ctx: &Context,
    log: &Logger,
) -> Result<()> {
    for task in tasks {
        tasks::execute(task, ctx);
    }

    let skipped = ctx.skipped_symlinks();
    if skipped > 0 {
        ctx.log.note(&format!(
            "{skipped} symlink(s) were skipped because they already existed"
        ));
    }
    log.print_summary();

    let count = log.failure_count();
    if count > 0 {
        anyhow::bail!("{count} task(s) failed");
    }
    Ok(())
}

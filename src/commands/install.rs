//! Command: provision the machine from a template.
use std::io::{BufRead, Write};
use std::sync::Arc;

use anyhow::{Context as _, Result, bail};

use crate::cli::{GlobalOpts, InstallOpts};
use crate::config::{ConfigStore, DEFAULT_TEMPLATE, KNOWN_TEMPLATES};
use crate::exec::Executor;
use crate::logging::{Log, Logger};
use crate::platform::{HandlerDeps, Platform, PlatformHandler, handler_for, platform_from_flags};
use crate::privilege::PrivilegeManager;
use crate::tasks::{self, Context};

/// Run the install command.
///
/// `privilege` is created by the caller so that an interrupt can tear down
/// an open grant.
///
/// # Errors
///
/// Returns an error on contradictory platform flags, configuration errors,
/// or if any step failed.
pub fn run(
    global: &GlobalOpts,
    opts: &InstallOpts,
    log: &Arc<Logger>,
    executor: Arc<dyn Executor>,
    privilege: Arc<PrivilegeManager>,
) -> Result<()> {
    // must fail before anything touches the host
    let forced = platform_from_flags(global.arch, global.debian)?;

    let version = option_env!("PROVISION_VERSION").unwrap_or(env!("CARGO_PKG_VERSION"));
    log.info(&format!("provision {version}"));

    log.stage("Loading configuration");
    let store = Arc::new(super::open_store(global, log)?);
    let name = if opts.interactive {
        let stdin = std::io::stdin();
        pick_template(&store, &mut stdin.lock(), &mut std::io::stdout())?
    } else {
        opts.template
            .clone()
            .unwrap_or_else(|| DEFAULT_TEMPLATE.to_string())
    };
    let template = store.load_template(&name)?;
    log.info(&format!("template: {} ({})", template.name, template.description));
    report_warnings(&store, &template.name, &**log);

    log.stage("Detecting platform");
    let platform = Platform::resolve(forced);
    if forced.is_some() {
        log.info(&format!("platform: {platform} (forced)"));
    } else {
        log.info(&format!("platform: {platform}"));
    }

    let ctx = Context::new(
        Arc::clone(&store),
        template,
        Arc::clone(log) as Arc<dyn Log>,
        Arc::clone(&executor),
    )?
    .with_privilege(Some(Arc::clone(&privilege)))
    .with_dry_run(global.dry_run)
    .with_force_private(opts.private);

    let handler = match handler_for(
        platform,
        HandlerDeps::new(executor, Some(privilege), &ctx.home),
    ) {
        Ok(handler) => Some(Arc::<dyn PlatformHandler>::from(handler)),
        Err(e) => {
            log.warn(&format!("{e}; package steps will fail"));
            None
        }
    };
    let ctx = ctx.with_platform(platform, handler);

    let selected = tasks::select_install_tasks(&opts.only, &opts.skip);
    if selected.is_empty() {
        bail!("--only and --skip leave no steps to run");
    }
    super::run_tasks_to_completion(selected.iter().map(Box::as_ref), &ctx, log)
}

/// Log cross-reference warnings for `template`.
///
/// Artifacts that fail to load here are reported by the step that needs them.
pub fn report_warnings(store: &ConfigStore, template: &str, log: &dyn Log) {
    match store.cross_reference_warnings(template) {
        Ok(warnings) if warnings.is_empty() => {}
        Ok(warnings) => {
            log.warn(&format!(
                "found {} configuration warning(s):",
                warnings.len()
            ));
            for warning in &warnings {
                log.warn(&format!(
                    "  {} [{}]: {}",
                    warning.source, warning.item, warning.message
                ));
            }
        }
        Err(e) => log.debug(&format!("skipping cross-reference checks: {e}")),
    }
}

/// Prompt for one of [`KNOWN_TEMPLATES`] on `input`.
///
/// Accepts a menu number or a template name; an empty answer picks
/// [`DEFAULT_TEMPLATE`].
///
/// # Errors
///
/// Returns an error if reading fails or the answer matches no template.
pub fn pick_template(
    store: &ConfigStore,
    input: &mut impl BufRead,
    output: &mut impl Write,
) -> Result<String> {
    writeln!(output, "Available templates:")?;
    for (i, name) in KNOWN_TEMPLATES.iter().enumerate() {
        let description = store
            .load_template(name)
            .map(|t| t.description.clone())
            .unwrap_or_else(|_| "(not configured)".to_string());
        writeln!(output, "  {}) {name:<10} {description}", i + 1)?;
    }
    write!(output, "Select a template [{DEFAULT_TEMPLATE}]: ")?;
    output.flush()?;

    let mut answer = String::new();
    input
        .read_line(&mut answer)
        .context("reading template selection")?;
    let answer = answer.trim();
    if answer.is_empty() {
        return Ok(DEFAULT_TEMPLATE.to_string());
    }
    if let Some(name) = answer
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| KNOWN_TEMPLATES.get(i))
    {
        return Ok((*name).to_string());
    }
    if KNOWN_TEMPLATES.contains(&answer) {
        return Ok(answer.to_string());
    }
    bail!("invalid template selection '{answer}'")
}

//! `provision` binary entry point.
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::{CommandFactory, Parser};

use dotfiles_provision::cli::{Cli, Command};
use dotfiles_provision::commands;
use dotfiles_provision::error::kind_of;
use dotfiles_provision::exec::{Executor, SystemExecutor};
use dotfiles_provision::logging::{Logger, init_subscriber};
use dotfiles_provision::privilege::PrivilegeManager;

/// Exit status after Ctrl-C.
const INTERRUPTED: i32 = 130;

fn main() -> ExitCode {
    let args = Cli::parse();
    init_subscriber(args.verbose, args.command.log_name());
    let log = Arc::new(Logger::new(args.command.log_name()));

    match run(&args, &log) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let kind = kind_of(&e).map_or_else(String::new, |k| format!("{k} "));
            tracing::error!("{kind}error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::print_stdout)]
fn run(args: &Cli, log: &Arc<Logger>) -> Result<()> {
    match &args.command {
        Command::Install(opts) => {
            let executor: Arc<dyn Executor> = Arc::new(SystemExecutor);
            let privilege = Arc::new(PrivilegeManager::new(Arc::clone(&executor)));
            let on_interrupt = Arc::clone(&privilege);
            if let Err(e) = ctrlc::set_handler(move || {
                tracing::warn!("interrupted");
                if let Err(e) = on_interrupt.cleanup_permissions() {
                    tracing::warn!("{e}");
                }
                std::process::exit(INTERRUPTED);
            }) {
                tracing::debug!("cannot install Ctrl-C handler: {e}");
            }
            commands::install::run(&args.global, opts, log, executor, privilege)
        }
        Command::Validate => commands::validate::run(&args.global, log),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            clap_complete::generate(*shell, &mut cmd, name, &mut std::io::stdout());
            Ok(())
        }
        Command::Version => {
            let version = option_env!("PROVISION_VERSION").unwrap_or(env!("CARGO_PKG_VERSION"));
            println!("provision {version}");
            Ok(())
        }
    }
}

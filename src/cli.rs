//! Command-line interface definitions.
use clap::{Parser, Subcommand};
use clap_complete::Shell;

use crate::tasks::Step;

/// Top-level CLI entry point for the provisioning orchestrator.
#[derive(Parser, Debug)]
#[command(
    name = "provision",
    about = "Configuration-driven Linux workstation provisioning",
    version
)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Options shared by every subcommand.
    #[command(flatten)]
    pub global: GlobalOpts,
}

/// Options shared across all subcommands.
#[derive(Parser, Debug, Clone, Default)]
pub struct GlobalOpts {
    /// Preview changes without applying
    #[arg(short = 'd', long, global = true)]
    pub dry_run: bool,

    /// Override dotfiles root directory
    #[arg(long, global = true)]
    pub root: Option<std::path::PathBuf>,

    /// Treat the host as Arch-family, skipping detection
    #[arg(long, global = true)]
    pub arch: bool,

    /// Treat the host as Debian-family, skipping detection
    #[arg(long, global = true, visible_alias = "ubuntu")]
    pub debian: bool,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Provision this machine from the selected template
    Install(InstallOpts),
    /// Validate every configuration artifact and report problems
    Validate,
    /// Print a shell completion script
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
    /// Print version information
    Version,
}

impl Command {
    /// Name used for the log file of this subcommand.
    #[must_use]
    pub const fn log_name(&self) -> &'static str {
        match self {
            Self::Install(_) => "install",
            Self::Validate => "validate",
            Self::Completions { .. } => "completions",
            Self::Version => "version",
        }
    }
}

/// Options for the `install` subcommand.
#[derive(Parser, Debug, Clone, Default)]
pub struct InstallOpts {
    /// Template to install (headless, desktop, personal)
    #[arg(short, long, conflicts_with = "interactive")]
    pub template: Option<String>,

    /// Pick the template from a menu
    #[arg(short, long)]
    pub interactive: bool,

    /// Run only these steps
    #[arg(long, value_delimiter = ',', value_enum)]
    pub only: Vec<Step>,

    /// Skip these steps
    #[arg(long, value_delimiter = ',', value_enum)]
    pub skip: Vec<Step>,

    /// Install private packages even if the template does not ask for them
    #[arg(long)]
    pub private: bool,
}

//! Domain-specific error types for the provisioning engine.
//!
//! Internal modules return typed errors built with [`thiserror`] while task
//! bodies and command handlers convert them to [`anyhow::Error`] via `?`.
//! Each domain error reports its [`ErrorKind`] and whether the surrounding
//! batch may continue after it.
//!
//! # Error hierarchy
//!
//! ```text
//! ErrorKind
//! ├── Configuration  ConfigError      never recoverable
//! ├── Platform       PlatformError    detection degrades, bootstrap is fatal
//! ├── Package        PackageError     recoverable unless stated otherwise
//! ├── Symlink        SymlinkError     isolated per mapping
//! └── Permission     PermissionError  setup degrades, cleanup is logged
//! ```

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::config::validation::ValidationIssue;

/// Boxed underlying cause, as produced by the command executor.
pub type Cause = Box<dyn std::error::Error + Send + Sync>;

/// Broad classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Schema or file problems in the configuration artifacts.
    Configuration,
    /// Platform detection or package-manager bootstrap problems.
    Platform,
    /// Package installation or verification problems.
    Package,
    /// Symlink backup or creation problems.
    Symlink,
    /// Privilege bracket problems.
    Permission,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => write!(f, "configuration"),
            Self::Platform => write!(f, "platform"),
            Self::Package => write!(f, "package"),
            Self::Symlink => write!(f, "symlink"),
            Self::Permission => write!(f, "permission"),
        }
    }
}

fn join_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors raised while loading or validating configuration artifacts.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required artifact does not exist.
    #[error("{artifact} not found at {}", path.display())]
    NotFound {
        /// Artifact label (e.g. `template.desktop`, `symlinks`).
        artifact: String,
        /// Path that was looked up.
        path: PathBuf,
    },

    /// The artifact exists but could not be read.
    #[error("failed to read {artifact} at {}: {source}", path.display())]
    Io {
        /// Artifact label.
        artifact: String,
        /// Path of the unreadable file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The artifact is not well-formed JSON.
    #[error("invalid JSON in {artifact} at {}: {source}", path.display())]
    Syntax {
        /// Artifact label.
        artifact: String,
        /// Path of the malformed file.
        path: PathBuf,
        /// Underlying parser error.
        source: serde_json::Error,
    },

    /// The artifact parsed but violates its schema.
    #[error("invalid {artifact} at {}: {}", path.display(), join_issues(issues))]
    Invalid {
        /// Artifact label.
        artifact: String,
        /// Path of the offending file.
        path: PathBuf,
        /// Every field-level problem found in the artifact.
        issues: Vec<ValidationIssue>,
    },

    /// Aggregate result of validating every known artifact.
    #[error("Configuration validation failed: {}", join_issues(issues))]
    ValidationFailed {
        /// Every problem found across all artifacts.
        issues: Vec<ValidationIssue>,
    },
}

impl ConfigError {
    /// Configuration errors always belong to [`ErrorKind::Configuration`].
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        ErrorKind::Configuration
    }

    /// A broken configuration aborts the run.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        false
    }

    /// File the error refers to, if any.
    #[must_use]
    pub const fn path(&self) -> Option<&PathBuf> {
        match self {
            Self::NotFound { path, .. }
            | Self::Io { path, .. }
            | Self::Syntax { path, .. }
            | Self::Invalid { path, .. } => Some(path),
            Self::ValidationFailed { .. } => None,
        }
    }

    /// Flatten the error into dotted-path issues for aggregate reporting.
    #[must_use]
    pub fn into_issues(self) -> Vec<ValidationIssue> {
        match self {
            Self::Invalid { issues, .. } | Self::ValidationFailed { issues } => issues,
            Self::NotFound { ref artifact, .. }
            | Self::Io { ref artifact, .. }
            | Self::Syntax { ref artifact, .. } => {
                let path = artifact.clone();
                vec![ValidationIssue::new(path, self.to_string())]
            }
        }
    }
}

/// Errors raised by platform selection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    /// Both distribution override flags were given.
    #[error("Conflicting distribution flags: --arch and --debian cannot be used together")]
    ConflictingOverrides,

    /// The host is not a supported distribution family.
    #[error("unsupported platform: {0}")]
    Unsupported(String),
}

impl PlatformError {
    /// Platform errors always belong to [`ErrorKind::Platform`].
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        ErrorKind::Platform
    }
}

/// Errors raised while installing packages.
#[derive(Error, Debug)]
pub enum PackageError {
    /// The install command succeeded but the package still reports missing.
    #[error(
        "package '{package}' is not installed after installation (resolved: {})",
        resolved.join(", ")
    )]
    VerificationFailed {
        /// Generic package name.
        package: String,
        /// Platform packages it resolved to.
        resolved: Vec<String>,
    },

    /// The package manager failed.
    #[error("failed to install '{package}': {source}")]
    InstallFailed {
        /// Generic package name.
        package: String,
        /// Underlying command failure.
        source: Cause,
    },

    /// A `postInstall` hook of the package failed.
    #[error("post-install command '{command}' for '{package}' failed: {source}")]
    HookFailed {
        /// Generic package name.
        package: String,
        /// Hook command line.
        command: String,
        /// Underlying command failure.
        source: Cause,
    },

    /// No package handler exists for the host.
    #[error("cannot install packages on an unknown platform")]
    UnsupportedPlatform,

    /// Loading the definitions or template failed.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A non-recoverable error raised while installing a template.
    #[error("template '{template}': {source}")]
    Template {
        /// Template being installed.
        template: String,
        /// The error that aborted the template.
        source: Box<PackageError>,
    },
}

impl PackageError {
    /// Kind of the innermost error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(e) => e.kind(),
            Self::Template { source, .. } => source.kind(),
            _ => ErrorKind::Package,
        }
    }

    /// Whether installation of the remaining packages may continue.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::VerificationFailed { .. } | Self::InstallFailed { .. } | Self::HookFailed { .. }
        )
    }

    /// Generic package the error is about, if any.
    #[must_use]
    pub fn package(&self) -> Option<&str> {
        match self {
            Self::VerificationFailed { package, .. }
            | Self::InstallFailed { package, .. }
            | Self::HookFailed { package, .. } => Some(package),
            Self::Template { source, .. } => source.package(),
            Self::UnsupportedPlatform | Self::Config(_) => None,
        }
    }
}

/// Errors raised while creating one symlink.
#[derive(Error, Debug)]
pub enum SymlinkError {
    /// The mapping source does not exist in the dotfiles root.
    #[error("source does not exist: {}", path.display())]
    SourceMissing {
        /// Absolute source path.
        path: PathBuf,
    },

    /// The conflicting target could not be moved aside.
    #[error("failed to back up {} to {}: {cause}", target.display(), backup.display())]
    Backup {
        /// Conflicting path.
        target: PathBuf,
        /// Backup destination.
        backup: PathBuf,
        /// Underlying failure.
        #[source]
        cause: Cause,
    },

    /// The link itself could not be created.
    #[error("failed to link {} -> {}: {cause}", target.display(), link_to.display())]
    Create {
        /// Link path.
        target: PathBuf,
        /// Path the link points at.
        link_to: PathBuf,
        /// Underlying failure.
        #[source]
        cause: Cause,
    },
}

impl SymlinkError {
    /// Symlink errors always belong to [`ErrorKind::Symlink`].
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        ErrorKind::Symlink
    }

    /// One bad mapping never blocks the rest.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        true
    }
}

/// Errors raised by the privilege bracket.
#[derive(Error, Debug)]
pub enum PermissionError {
    /// `sudo -n true` failed: no cached elevated session.
    #[error("an active sudo session is required to set up temporary permissions")]
    NoElevatedSession,

    /// The invoking user could not be determined.
    #[error("cannot determine current user: {0}")]
    UnknownUser(String),

    /// Writing the staged grant failed.
    #[error("failed to stage sudoers file {}: {source}", path.display())]
    Stage {
        /// Staging path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Installing the grant into the system location failed.
    #[error("failed to install sudoers file {}: {cause}", path.display())]
    Install {
        /// Destination path.
        path: PathBuf,
        /// Underlying failure.
        #[source]
        cause: Cause,
    },

    /// Removing the grant failed.
    #[error("failed to remove sudoers file {}: {cause}", path.display())]
    Cleanup {
        /// Grant path.
        path: PathBuf,
        /// Underlying failure.
        #[source]
        cause: Cause,
    },
}

impl PermissionError {
    /// Permission errors always belong to [`ErrorKind::Permission`].
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        ErrorKind::Permission
    }

    /// Only cleanup failures leave the run in a usable state.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Cleanup { .. })
    }
}

/// Classify an [`anyhow::Error`] by the first domain error in its chain.
#[must_use]
pub fn kind_of(err: &anyhow::Error) -> Option<ErrorKind> {
    err.chain().find_map(|cause| {
        if let Some(e) = cause.downcast_ref::<ConfigError>() {
            Some(e.kind())
        } else if let Some(e) = cause.downcast_ref::<PlatformError>() {
            Some(e.kind())
        } else if let Some(e) = cause.downcast_ref::<PackageError>() {
            Some(e.kind())
        } else if let Some(e) = cause.downcast_ref::<SymlinkError>() {
            Some(e.kind())
        } else {
            cause.downcast_ref::<PermissionError>().map(PermissionError::kind)
        }
    })
}

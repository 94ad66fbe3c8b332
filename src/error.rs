//! Error types for domain backup and restore
//!
//! Every failure the backup core can produce is a variant of [`BackupError`].
//! Variants that involve the filesystem carry the paths needed to diagnose
//! the failure without re-deriving state.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::outcome::Outcome;

/// Reasons a request is rejected before any filesystem state is touched
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidRequest {
    /// No domain name was given and `force` was not set
    UseForceOption,
    /// No domain name was given and there is no archive to read one from
    MissingDomainName,
    /// The domains directory does not exist or is not a directory
    NoDomainsDir(PathBuf),
    /// The domain name cannot be used as a single path component
    BadDomainName(String),
}

impl fmt::Display for InvalidRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UseForceOption => write!(
                f,
                "no domain name given; use the force option to take it from the backup file"
            ),
            Self::MissingDomainName => write!(f, "a domain name is required"),
            Self::NoDomainsDir(path) => {
                write!(f, "domains directory does not exist: {}", path.display())
            }
            Self::BadDomainName(name) => write!(f, "invalid domain name: '{}'", name),
        }
    }
}

/// Which rename of the swap protocol failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapStage {
    /// Moving the live directory aside; the live tree is untouched
    RetireOriginal,
    /// Moving the staged directory into place; the live tree was rolled back
    PromoteRestored,
}

impl fmt::Display for SwapStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RetireOriginal => write!(f, "could not rename the original directory"),
            Self::PromoteRestored => write!(f, "could not rename the restored directory"),
        }
    }
}

/// The main error type for backup operations
#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Invalid request: {0}")]
    InvalidRequest(InvalidRequest),

    #[error("Domain directory does not exist: {}", .0.display())]
    NoDomainDir(PathBuf),

    #[error("Backup directory does not exist: {}", .0.display())]
    NoBackupDir(PathBuf),

    #[error("No backups found in {}", .0.display())]
    NoBackupsFound(PathBuf),

    #[error("Corrupt backup file {}: {reason}", .path.display())]
    CorruptBackupFile { path: PathBuf, reason: String },

    #[error("Backup was taken from domain '{archived}', not '{requested}'; use the force option to restore it anyway")]
    DomainNameMismatch { archived: String, requested: String },

    #[error("Backup {} is a full backup; a configuration-only restore needs a configuration-only backup", .0.display())]
    NotConfigOnlyBackup(PathBuf),

    #[error("Too many backups in {}; remove old backups before creating new ones", .0.display())]
    VersionOverflow(PathBuf),

    #[error("Failed to write backup archive {}: {reason}", .path.display())]
    ArchiveWriteFailure { path: PathBuf, reason: String },

    #[error("Failed to expand backup archive {}: {reason}", .path.display())]
    ArchiveExpandFailure { path: PathBuf, reason: String },

    /// The swap failed but the live tree is intact (or was restored)
    #[error("Restore failed, {stage} {}: {reason}", .path.display())]
    SwapRenameFailure {
        stage: SwapStage,
        path: PathBuf,
        reason: String,
    },

    /// The swap failed and rollback failed too; the live directory may be missing
    #[error("FATAL: could not revert {} from {}: {reason}; the domain must be recovered by hand", .live.display(), .retired.display())]
    SwapUnrecoverable {
        live: PathBuf,
        retired: PathBuf,
        reason: String,
    },

    #[error("Could not fix permissions on {}: {reason}", .path.display())]
    PermissionFixupWarning { path: PathBuf, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("JSON error: {0}")]
    Json(String),
}

impl BackupError {
    /// Create a corrupt-backup error
    pub fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::CorruptBackupFile {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Whether the live domain is known to be in its pre-operation state
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::SwapUnrecoverable { .. })
    }

    /// How calling tooling should classify this error
    pub fn severity(&self) -> Outcome {
        match self {
            Self::NoBackupsFound(_) | Self::PermissionFixupWarning { .. } => Outcome::Warning,
            _ => Outcome::Failure,
        }
    }
}

impl From<InvalidRequest> for BackupError {
    fn from(reason: InvalidRequest) -> Self {
        Self::InvalidRequest(reason)
    }
}

impl From<std::io::Error> for BackupError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for BackupError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

/// Result type alias for backup operations
pub type BackupResult<T> = Result<T, BackupError>;

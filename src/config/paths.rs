//! Path management for domain backups
//!
//! Names the well-known locations inside a domain directory and resolves
//! where the tool's own settings file lives.
//!
//! ## Settings File Resolution Order
//!
//! 1. `DOMAIN_BACKUP_CONFIG` environment variable (if set)
//! 2. Platform config directory from `directories` (e.g. `~/.config/domain-backup/config.json`)

use std::path::{Path, PathBuf};

use directories::ProjectDirs;

use crate::error::BackupError;

/// Configuration subtree of a domain
pub const CONFIG_DIR: &str = "config";
/// Default backup-store directory inside a domain
pub const BACKUP_DIR: &str = "backups";
pub const BIN_DIR: &str = "bin";
/// Auxiliary cache never included in a snapshot
pub const OSGI_CACHE_DIR: &str = "osgi-cache";
pub const GENERATED_TMP_DIR: &str = "generated/tmp";
pub const MASTER_PASSWORD_FILE: &str = "master-password";
/// Metadata file embedded at the root of every archive
pub const PROPS_FILENAME: &str = "backup.properties";

/// Environment variable overriding the settings file location
pub const SETTINGS_ENV_VAR: &str = "DOMAIN_BACKUP_CONFIG";

/// Well-known locations inside one domain directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainLayout {
    domain_dir: PathBuf,
}

impl DomainLayout {
    /// Layout of the domain rooted at `domain_dir`
    pub fn new(domain_dir: impl Into<PathBuf>) -> Self {
        Self {
            domain_dir: domain_dir.into(),
        }
    }

    /// Layout of `domain_name` under a domains directory
    pub fn in_domains_dir(domains_dir: &Path, domain_name: &str) -> Self {
        Self::new(domains_dir.join(domain_name))
    }

    pub fn domain_dir(&self) -> &Path {
        &self.domain_dir
    }

    pub fn config_dir(&self) -> PathBuf {
        self.domain_dir.join(CONFIG_DIR)
    }

    /// The default (unprofiled) backup-store directory
    pub fn backup_dir(&self) -> PathBuf {
        self.domain_dir.join(BACKUP_DIR)
    }

    pub fn bin_dir(&self) -> PathBuf {
        self.domain_dir.join(BIN_DIR)
    }

    pub fn generated_tmp_dir(&self) -> PathBuf {
        self.domain_dir.join(GENERATED_TMP_DIR)
    }

    pub fn master_password_file(&self) -> PathBuf {
        self.domain_dir.join(MASTER_PASSWORD_FILE)
    }

    /// Where a restored archive leaves its metadata file
    pub fn props_file(&self, config_only: bool) -> PathBuf {
        if config_only {
            self.config_dir().join(PROPS_FILENAME)
        } else {
            self.domain_dir.join(PROPS_FILENAME)
        }
    }
}

/// Resolve the settings file path
///
/// # Errors
///
/// Returns an error if no platform config directory can be determined.
pub fn settings_file() -> Result<PathBuf, BackupError> {
    if let Ok(custom) = std::env::var(SETTINGS_ENV_VAR) {
        return Ok(PathBuf::from(custom));
    }

    ProjectDirs::from("", "", "domain-backup")
        .map(|dirs| dirs.config_dir().join("config.json"))
        .ok_or_else(|| BackupError::Config("Could not determine a config directory".into()))
}

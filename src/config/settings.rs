//! Persistent settings for domain backups
//!
//! Supplies defaults for the domains directory, backup store, profile and
//! retention limit when a request does not name them explicitly.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::BackupError;

/// User settings for domain backups
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Schema version for migration support
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    /// Directory holding the domains
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domains_dir: Option<PathBuf>,

    /// Explicit backup-store directory (archives go under `{backup_dir}/{domain}`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_dir: Option<PathBuf>,

    /// Backup-store profile subdirectory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_profile: Option<String>,

    /// Number of archives to keep; 0 or less keeps all of them
    #[serde(default)]
    pub recycle_limit: i32,
}

fn default_schema_version() -> u32 {
    1
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            domains_dir: None,
            backup_dir: None,
            backup_profile: None,
            recycle_limit: 0,
        }
    }
}

impl Settings {
    /// Load settings from disk, or use defaults if the file doesn't exist
    pub fn load_or_default(path: &Path) -> Result<Self, BackupError> {
        if !path.exists() {
            return Ok(Settings::default());
        }

        let contents = std::fs::read_to_string(path)
            .map_err(|e| BackupError::Io(format!("Failed to read settings file: {}", e)))?;

        serde_json::from_str(&contents)
            .map_err(|e| BackupError::Config(format!("Failed to parse settings file: {}", e)))
    }

    /// Save settings to disk
    pub fn save(&self, path: &Path) -> Result<(), BackupError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                BackupError::Io(format!("Failed to create settings directory: {}", e))
            })?;
        }

        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| BackupError::Config(format!("Failed to serialize settings: {}", e)))?;

        std::fs::write(path, contents)
            .map_err(|e| BackupError::Io(format!("Failed to write settings file: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.recycle_limit, 0);
        assert!(settings.domains_dir.is_none());
        assert!(settings.backup_profile.is_none());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let settings = Settings::load_or_default(&temp_dir.path().join("none.json")).unwrap();
        assert_eq!(settings.schema_version, 1);
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.json");

        let settings = Settings {
            domains_dir: Some(PathBuf::from("/srv/domains")),
            backup_profile: Some("nightly".into()),
            recycle_limit: 5,
            ..Settings::default()
        };
        settings.save(&path).unwrap();

        let loaded = Settings::load_or_default(&path).unwrap();
        assert_eq!(loaded.domains_dir, Some(PathBuf::from("/srv/domains")));
        assert_eq!(loaded.backup_profile.as_deref(), Some("nightly"));
        assert_eq!(loaded.recycle_limit, 5);
    }

    #[test]
    fn test_partial_file_uses_field_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        std::fs::write(&path, r#"{"recycle_limit": 3}"#).unwrap();

        let loaded = Settings::load_or_default(&path).unwrap();
        assert_eq!(loaded.recycle_limit, 3);
        assert_eq!(loaded.schema_version, 1);
        assert!(loaded.backup_dir.is_none());
    }

    #[test]
    fn test_invalid_file_is_config_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        std::fs::write(&path, "not json").unwrap();

        let err = Settings::load_or_default(&path).unwrap_err();
        assert!(matches!(err, BackupError::Config(_)));
    }
}

//! Versioned archive naming
//!
//! Archives are named `{domain}_{YYYY_MM_DD}_v{NNNNN}.zip`. Ordering is by
//! the numeric version suffix only; the date and the filesystem timestamps
//! play no part.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};
use tracing::debug;

use crate::error::{BackupError, BackupResult};

use super::status::Status;

/// Versions at or above this are refused; old archives must be cleaned up by hand
pub const VERSION_LIMIT: u64 = 100_000;

/// One valid archive in a backup-store directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupFile {
    pub path: PathBuf,
    pub filename: String,
    pub version: u64,
    /// Internal metadata timestamp in milliseconds
    pub timestamp_millis: i64,
}

/// Index of the archives in one backup-store directory, ascending by version
#[derive(Debug)]
pub struct FilenameManager {
    backup_dir: PathBuf,
    domain_name: String,
    index: BTreeMap<u64, BackupFile>,
}

impl FilenameManager {
    /// Scan `backup_dir` for archives of `domain_name`
    ///
    /// Files with unparsable names or without a positive internal timestamp
    /// are left out. A missing directory yields an empty index.
    pub fn scan(backup_dir: &Path, domain_name: &str) -> BackupResult<Self> {
        let mut index = BTreeMap::new();

        if backup_dir.is_dir() {
            for entry in fs::read_dir(backup_dir).map_err(|e| {
                BackupError::Io(format!("Failed to read backup directory: {}", e))
            })? {
                let entry = entry.map_err(|e| {
                    BackupError::Io(format!("Failed to read directory entry: {}", e))
                })?;

                let path = entry.path();
                if !path.is_file() {
                    continue;
                }
                if let Some(file) = parse_backup_file(&path, domain_name) {
                    index.insert(file.version, file);
                }
            }
        }

        Ok(Self {
            backup_dir: backup_dir.to_path_buf(),
            domain_name: domain_name.to_string(),
            index,
        })
    }

    /// Path for the next archive, dated today
    pub fn next(&self) -> BackupResult<PathBuf> {
        self.next_on(Local::now().date_naive())
    }

    /// Path for the next archive, dated `date`
    pub fn next_on(&self, date: NaiveDate) -> BackupResult<PathBuf> {
        let version = self.index.keys().next_back().map_or(1, |max| max + 1);
        if version >= VERSION_LIMIT {
            return Err(BackupError::VersionOverflow(self.backup_dir.clone()));
        }

        Ok(self
            .backup_dir
            .join(format_filename(&self.domain_name, date, version)))
    }

    /// The archive with the highest version
    pub fn latest(&self) -> BackupResult<&BackupFile> {
        self.index
            .values()
            .next_back()
            .ok_or_else(|| BackupError::NoBackupsFound(self.backup_dir.clone()))
    }

    /// The oldest archives beyond the newest `limit`; empty if `limit <= 0`
    pub fn recycle_candidates(&self, limit: i32) -> Vec<&BackupFile> {
        if limit <= 0 {
            return Vec::new();
        }

        let overflow = self.index.len().saturating_sub(limit as usize);
        self.index.values().take(overflow).collect()
    }

    /// All archives, ascending by version
    pub fn backups(&self) -> impl Iterator<Item = &BackupFile> {
        self.index.values()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

/// `{domain}_{YYYY_MM_DD}_v{NNNNN}.zip`
pub fn format_filename(domain_name: &str, date: NaiveDate, version: u64) -> String {
    format!("{}_{}_v{:05}.zip", domain_name, date.format("%Y_%m_%d"), version)
}

/// Parse the version out of an archive name belonging to `domain_name`
///
/// The `.zip` suffix is matched case-insensitively.
pub fn parse_version(filename: &str, domain_name: &str) -> Option<u64> {
    let rest = filename.strip_prefix(domain_name)?.strip_prefix('_')?;
    if rest.len() < 4 || !rest.is_char_boundary(rest.len() - 4) {
        return None;
    }
    let (stem, suffix) = rest.split_at(rest.len() - 4);
    if !suffix.eq_ignore_ascii_case(".zip") {
        return None;
    }

    // YYYY_MM_DD_vNNNNN
    let (date, version) = stem.split_once("_v")?;
    let date_ok = date.len() == 10
        && date.char_indices().all(|(i, c)| match i {
            4 | 7 => c == '_',
            _ => c.is_ascii_digit(),
        });
    if !date_ok || version.len() < 5 || !version.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    version.parse().ok().filter(|v| *v > 0)
}

fn parse_backup_file(path: &Path, domain_name: &str) -> Option<BackupFile> {
    let filename = path.file_name()?.to_str()?.to_string();
    let Some(version) = parse_version(&filename, domain_name) else {
        debug!(file = %filename, "not a backup archive name");
        return None;
    };

    let timestamp_millis = Status::read_timestamp(path);
    if timestamp_millis <= 0 {
        debug!(file = %filename, "archive has no valid metadata, ignoring");
        return None;
    }

    Some(BackupFile {
        path: path.to_path_buf(),
        filename,
        version,
        timestamp_millis,
    })
}

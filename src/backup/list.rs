//! Listing the archives of a domain

use std::fs;
use std::path::PathBuf;

use tracing::{debug, info_span};

use crate::error::{BackupError, BackupResult};
use crate::outcome::Report;

use super::filename::FilenameManager;
use super::request::{BackupRequest, RequestContext};
use super::status::Status;

/// One archive found while listing
#[derive(Debug, Clone)]
pub struct ListedBackup {
    pub path: PathBuf,
    pub filename: String,
    pub version: u64,
    /// Profile subdirectory the archive was found in, if any
    pub profile: Option<String>,
    pub status: Status,
}

/// Lists the backups of one domain
pub struct ListManager {
    ctx: RequestContext,
}

impl ListManager {
    pub fn new(request: BackupRequest) -> BackupResult<Self> {
        let ctx = RequestContext::validate(request)?;
        ctx.require_domain()?;
        Ok(Self { ctx })
    }

    /// All valid archives, ascending by version within each store directory
    ///
    /// Without an explicit profile, profile subdirectories of the store are
    /// listed as well.
    pub fn list(&self) -> BackupResult<Vec<ListedBackup>> {
        let (name, layout) = self.ctx.require_domain()?;
        let _span = info_span!("list", domain = %name).entered();

        if !layout.domain_dir().is_dir() && self.ctx.request().backup_dir.is_none() {
            return Err(BackupError::NoDomainDir(layout.domain_dir().to_path_buf()));
        }

        let store_dir = self.ctx.backup_store_dir(layout.domain_dir(), name);
        let profile = self.ctx.request().backup_profile.clone();
        let mut listed = collect(&store_dir, name, profile.clone())?;

        if profile.is_none() && store_dir.is_dir() {
            let mut profiles: Vec<(String, PathBuf)> = fs::read_dir(&store_dir)
                .map_err(|e| BackupError::Io(format!("Failed to read backup directory: {}", e)))?
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.path().is_dir())
                .map(|entry| (entry.file_name().to_string_lossy().into_owned(), entry.path()))
                .collect();
            profiles.sort();

            for (profile, dir) in profiles {
                listed.extend(collect(&dir, name, Some(profile))?);
            }
        }

        debug!(count = listed.len(), "backups listed");
        Ok(listed)
    }

    /// List and summarize; no backups is a warning, not a failure
    pub fn report(&self) -> BackupResult<(Report, Vec<ListedBackup>)> {
        let backups = self.list()?;
        let (name, layout) = self.ctx.require_domain()?;

        let report = if backups.is_empty() {
            let store_dir = self.ctx.backup_store_dir(layout.domain_dir(), name);
            Report::warning(BackupError::NoBackupsFound(store_dir).to_string())
        } else {
            Report::ok(format!("{} backup(s) of domain {}", backups.len(), name))
        };

        Ok((report, backups))
    }
}

fn collect(dir: &std::path::Path, name: &str, profile: Option<String>) -> BackupResult<Vec<ListedBackup>> {
    let filenames = FilenameManager::scan(dir, name)?;
    let mut listed = Vec::with_capacity(filenames.len());

    for file in filenames.backups() {
        let status = Status::read_archive(&file.path)?;
        listed.push(ListedBackup {
            path: file.path.clone(),
            filename: file.filename.clone(),
            version: file.version,
            profile: profile.clone(),
            status,
        });
    }

    Ok(listed)
}

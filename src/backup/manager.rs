//! Snapshot creation and retention
//!
//! Takes one versioned archive of a domain (or of its config subtree) and
//! then recycles the oldest archives beyond the retention limit.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, info_span, warn};

use crate::config::paths::{BACKUP_DIR, OSGI_CACHE_DIR, PROPS_FILENAME};
use crate::error::{BackupError, BackupResult};
use crate::outcome::Report;

use super::archive::{self, ExtraEntry};
use super::filename::{parse_version, FilenameManager};
use super::request::{BackupRequest, RequestContext};
use super::status::{current_user, BackupKind, Status};

/// Details of a freshly written archive
#[derive(Debug, Clone)]
pub struct BackupInfo {
    /// Full path to the archive
    pub path: PathBuf,
    pub filename: String,
    pub version: u64,
    pub kind: BackupKind,
    /// Human-readable summary: domain, date and user
    pub description: String,
}

/// Creates backups of one domain
pub struct BackupManager {
    ctx: RequestContext,
}

impl BackupManager {
    /// Validate a backup request; a domain name is required
    pub fn new(request: BackupRequest) -> BackupResult<Self> {
        let ctx = RequestContext::validate(request)?;
        ctx.require_domain()?;
        Ok(Self { ctx })
    }

    /// Store one archive, recycle old ones, and report
    pub fn backup(&self) -> BackupResult<Report> {
        let (name, _) = self.ctx.require_domain()?;
        let _span = info_span!("backup", domain = %name).entered();

        let info = self.store()?;
        let request = self.ctx.request();

        let mut message = String::new();
        if request.verbose || !request.terse {
            message = format!("Backed up domain {} to {}", name, info.path.display());
        }
        if request.verbose {
            message.push('\n');
            message.push_str(&info.description);
        }

        let mut report = Report::ok(message);
        for warning in self.recycle()? {
            report.push_warning(warning);
        }
        Ok(report)
    }

    /// Write exactly one new archive
    ///
    /// The archive is written under a temporary name in the store directory
    /// and renamed into place only once complete.
    pub fn store(&self) -> BackupResult<BackupInfo> {
        let (name, layout) = self.ctx.require_domain()?;
        let request = self.ctx.request();

        if !layout.domain_dir().is_dir() {
            return Err(BackupError::NoDomainDir(layout.domain_dir().to_path_buf()));
        }

        let kind = if request.config_only {
            BackupKind::ConfigOnly
        } else {
            BackupKind::Full
        };
        let source = match kind {
            BackupKind::ConfigOnly => layout.config_dir(),
            BackupKind::Full => layout.domain_dir().to_path_buf(),
        };
        if !source.is_dir() {
            return Err(BackupError::NoDomainDir(source));
        }

        let store_dir = self.ctx.backup_store_dir(layout.domain_dir(), name);
        fs::create_dir_all(&store_dir).map_err(|e| {
            BackupError::Io(format!(
                "Failed to create backup directory {}: {}",
                store_dir.display(),
                e
            ))
        })?;

        let filenames = FilenameManager::scan(&store_dir, name)?;
        let target = filenames.next()?;
        let filename = target
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_default();

        let excluded = exclusions(&source, &store_dir, kind);
        let entries = archive::collect_entries(&source, &excluded)?;

        let taken_at = self.ctx.timestamp();
        let mut status = Status::new(name, &request.domains_dir, &filename, kind, taken_at);
        status.description = request.description.clone().unwrap_or_default();
        let props = status.to_properties();
        let extra = [ExtraEntry {
            name: PROPS_FILENAME,
            contents: props.as_bytes(),
        }];

        remove_stale_temp_files(&store_dir, name);
        let temp_path = target.with_extension("zip.tmp");
        if let Err(e) = archive::create(&temp_path, &source, &entries, &excluded, &extra) {
            let _ = fs::remove_file(&temp_path);
            return Err(match e {
                BackupError::ArchiveWriteFailure { reason, .. } => BackupError::ArchiveWriteFailure {
                    path: target,
                    reason,
                },
                other => other,
            });
        }

        fs::rename(&temp_path, &target).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            BackupError::ArchiveWriteFailure {
                path: target.clone(),
                reason: e.to_string(),
            }
        })?;

        info!(archive = %target.display(), entries = entries.len(), "backup written");

        let description = format!(
            "{} backup of {} created on {} by user {}",
            kind,
            name,
            taken_at.format("%Y-%m-%d %H:%M:%S"),
            current_user()
        );

        Ok(BackupInfo {
            version: parse_version(&filename, name).unwrap_or_default(),
            path: target,
            filename,
            kind,
            description,
        })
    }

    /// Delete the archives beyond the retention limit
    ///
    /// Returns one warning per archive that could not be deleted.
    pub fn recycle(&self) -> BackupResult<Vec<BackupError>> {
        let (name, layout) = self.ctx.require_domain()?;
        let store_dir = self.ctx.backup_store_dir(layout.domain_dir(), name);
        let filenames = FilenameManager::scan(&store_dir, name)?;

        let mut warnings = Vec::new();
        for old in filenames.recycle_candidates(self.ctx.request().recycle_limit) {
            match fs::remove_file(&old.path) {
                Ok(()) => info!(archive = %old.filename, "recycled old backup"),
                Err(e) => {
                    warn!(archive = %old.path.display(), error = %e, "failed to recycle backup");
                    warnings.push(BackupError::Io(format!(
                        "Failed to delete old backup {}: {}",
                        old.path.display(),
                        e
                    )));
                }
            }
        }

        Ok(warnings)
    }
}

/// Delete `{name}_*.zip.tmp` files left behind by an interrupted backup
fn remove_stale_temp_files(store_dir: &Path, name: &str) {
    let Ok(entries) = fs::read_dir(store_dir) else {
        return;
    };
    let prefix = format!("{}_", name);

    for entry in entries.filter_map(|e| e.ok()) {
        let filename = entry.file_name().to_string_lossy().into_owned();
        if !filename.starts_with(&prefix) || !filename.ends_with(".zip.tmp") {
            continue;
        }
        match fs::remove_file(entry.path()) {
            Ok(()) => info!(file = %filename, "removed stale temporary archive"),
            Err(e) => warn!(file = %filename, error = %e, "failed to remove stale temporary archive"),
        }
    }
}

/// Relative prefixes never included in a snapshot of `source`
fn exclusions(source: &Path, store_dir: &Path, kind: BackupKind) -> Vec<PathBuf> {
    let mut excluded = vec![PathBuf::from(PROPS_FILENAME)];
    if kind == BackupKind::Full {
        excluded.push(PathBuf::from(BACKUP_DIR));
        excluded.push(PathBuf::from(OSGI_CACHE_DIR));
    }
    if let Ok(rel) = store_dir.strip_prefix(source) {
        if !rel.as_os_str().is_empty() {
            excluded.push(rel.to_path_buf());
        }
    }
    excluded
}

//! Transactional restore of a domain from an archive
//!
//! The archive is expanded into a private staging directory next to the
//! domains, checked, and then swapped onto the live domain (or its config
//! subtree) with [`AtomicSwap`]. The live tree is never written to directly.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, info, info_span, warn};

use crate::config::paths::{BACKUP_DIR, PROPS_FILENAME};
use crate::config::DomainLayout;
use crate::error::{BackupError, BackupResult, InvalidRequest};
use crate::outcome::Report;

use super::archive;
use super::filename::FilenameManager;
use super::fs_util::{copy_tree, remove_tree, unique_path};
use super::permissions::fix_permissions;
use super::request::{check_domain_name, BackupRequest, RequestContext};
use super::status::{BackupKind, Status};
use super::swap::{retired_path, AtomicSwap, DirOps, StdDirOps};

/// Everything resolved before the live tree is touched
#[derive(Debug)]
struct RestorePlan {
    archive: PathBuf,
    domain_name: String,
    layout: DomainLayout,
    status: Status,
}

/// Restores domains from backup archives
pub struct RestoreManager<O: DirOps = StdDirOps> {
    ctx: RequestContext,
    ops: O,
}

impl RestoreManager<StdDirOps> {
    /// Validate a restore request
    pub fn new(request: BackupRequest) -> BackupResult<Self> {
        Self::with_dir_ops(request, StdDirOps)
    }
}

impl<O: DirOps> RestoreManager<O> {
    /// Validate a restore request, swapping through `ops`
    ///
    /// Without a domain name the request needs both an explicit archive and
    /// `force`; this is checked before the filesystem is looked at.
    pub fn with_dir_ops(request: BackupRequest, ops: O) -> BackupResult<Self> {
        if request.domain_name.is_none() {
            if !request.force {
                return Err(InvalidRequest::UseForceOption.into());
            }
            if request.backup_file.is_none() {
                return Err(InvalidRequest::MissingDomainName.into());
            }
        }

        let ctx = RequestContext::validate(request)?;
        Ok(Self { ctx, ops })
    }

    /// Restore the requested archive onto its domain
    pub fn restore(&self) -> BackupResult<Report> {
        let plan = self.resolve()?;
        let _span = info_span!("restore", domain = %plan.domain_name).entered();

        self.check_domain_name(&plan)?;
        let kind = plan.status.kind();
        if self.ctx.request().config_only && kind == BackupKind::Full {
            return Err(BackupError::NotConfigOnlyBackup(plan.archive.clone()));
        }
        info!(archive = %plan.archive.display(), %kind, "restoring");

        let staging = self.expand_to_staging(&plan)?;

        if kind == BackupKind::Full {
            if let Err(e) = copy_backups(&plan.layout, &staging) {
                remove_tree(&staging);
                return Err(e);
            }
        }

        let live = match kind {
            BackupKind::ConfigOnly => plan.layout.config_dir(),
            BackupKind::Full => plan.layout.domain_dir().to_path_buf(),
        };
        let retired = retired_path(&live, Utc::now().timestamp_millis());
        let swap = AtomicSwap::new(&live, &staging, retired).run(&self.ops)?;

        let mut report = Report::ok(String::new());
        if let Some(warning) = swap.cleanup_warning {
            report.push_warning(warning);
        }
        for warning in fix_permissions(&plan.layout) {
            report.push_warning(warning);
        }

        self.finish(&plan, kind, &mut report);
        Ok(report)
    }

    /// Pick the archive and the domain it will be restored onto
    fn resolve(&self) -> BackupResult<RestorePlan> {
        let request = self.ctx.request();

        match &request.backup_file {
            Some(file) => self.resolve_explicit(file),
            None => {
                let (name, layout) = self.ctx.require_domain()?;
                if !layout.domain_dir().is_dir() {
                    return Err(BackupError::NoDomainDir(layout.domain_dir().to_path_buf()));
                }

                let store_dir = self.ctx.backup_store_dir(layout.domain_dir(), name);
                if !store_dir.is_dir() {
                    return Err(BackupError::NoBackupDir(store_dir));
                }

                let filenames = FilenameManager::scan(&store_dir, name)?;
                let archive = filenames.latest()?.path.clone();
                debug!(archive = %archive.display(), "latest backup selected");

                Ok(RestorePlan {
                    status: Status::read_archive(&archive)?,
                    archive,
                    domain_name: name.to_string(),
                    layout: layout.clone(),
                })
            }
        }
    }

    fn resolve_explicit(&self, file: &Path) -> BackupResult<RestorePlan> {
        let len = fs::metadata(file).map(|m| m.len()).unwrap_or(0);
        if len == 0 {
            return Err(BackupError::corrupt(file, "file is empty or unreadable"));
        }

        let status = Status::read_archive(file)?;
        let request = self.ctx.request();

        let (domain_name, layout) = match (self.ctx.domain_name(), self.ctx.layout()) {
            (Some(name), Some(layout)) => (name.to_string(), layout.clone()),
            _ => {
                let name = status
                    .domain_name
                    .clone()
                    .ok_or_else(|| BackupError::corrupt(file, "no domain name in metadata"))?;
                check_domain_name(&name)?;
                let layout = DomainLayout::in_domains_dir(&request.domains_dir, &name);
                (name, layout)
            }
        };

        if !layout.domain_dir().is_dir() {
            fs::create_dir_all(layout.domain_dir()).map_err(|e| {
                BackupError::Io(format!(
                    "Failed to create domain directory {}: {}",
                    layout.domain_dir().display(),
                    e
                ))
            })?;
        }

        Ok(RestorePlan {
            archive: file.to_path_buf(),
            domain_name,
            layout,
            status,
        })
    }

    /// The archive must come from the requested domain unless forced
    fn check_domain_name(&self, plan: &RestorePlan) -> BackupResult<()> {
        let archived = plan
            .status
            .domain_name
            .as_deref()
            .ok_or_else(|| BackupError::corrupt(&plan.archive, "no domain name in metadata"))?;

        if archived != plan.domain_name {
            if !self.ctx.request().force {
                return Err(BackupError::DomainNameMismatch {
                    archived: archived.to_string(),
                    requested: plan.domain_name.clone(),
                });
            }
            warn!(archived, requested = %plan.domain_name, "restoring backup of a different domain");
        }
        Ok(())
    }

    /// Expand into a fresh staging directory and check it
    fn expand_to_staging(&self, plan: &RestorePlan) -> BackupResult<PathBuf> {
        let domains_dir = &self.ctx.request().domains_dir;
        let staging = unique_path(
            domains_dir,
            &format!("{}_", plan.domain_name),
            Utc::now().timestamp_millis(),
        );

        fs::create_dir(&staging).map_err(|e| BackupError::ArchiveExpandFailure {
            path: plan.archive.clone(),
            reason: format!("cannot create {}: {}", staging.display(), e),
        })?;

        if let Err(e) = archive::expand(&plan.archive, &staging) {
            remove_tree(&staging);
            return Err(e);
        }

        if !staging.join(PROPS_FILENAME).is_file() {
            remove_tree(&staging);
            return Err(BackupError::corrupt(
                &plan.archive,
                format!("no {} in backup of {}", PROPS_FILENAME, plan.domain_name),
            ));
        }

        debug!(staging = %staging.display(), "archive expanded");
        Ok(staging)
    }

    /// Build the message and remove the restored metadata file
    fn finish(&self, plan: &RestorePlan, kind: BackupKind, report: &mut Report) {
        let request = self.ctx.request();
        let props = plan.layout.props_file(kind == BackupKind::ConfigOnly);

        if request.verbose || !request.terse {
            report.message = match kind {
                BackupKind::ConfigOnly => format!(
                    "Restored the configuration of domain {} in {}",
                    plan.domain_name,
                    plan.layout.domain_dir().display()
                ),
                BackupKind::Full => format!(
                    "Restored domain {} to {}",
                    plan.domain_name,
                    plan.layout.domain_dir().display()
                ),
            };
        }

        if request.verbose {
            match Status::read_file(&props) {
                Ok(status) => {
                    report.message.push('\n');
                    report.message.push_str(&status.summary());
                }
                Err(e) => warn!(error = %e, "could not read restored metadata"),
            }
        }

        if let Err(e) = fs::remove_file(&props) {
            warn!(path = %props.display(), error = %e, "deferring metadata file removal");
            report.pending_cleanup.push(props);
        }
    }
}

/// Carry the live backup history into a full-domain staging tree
fn copy_backups(layout: &DomainLayout, staging: &Path) -> BackupResult<()> {
    let live_backups = layout.backup_dir();
    if !live_backups.is_dir() {
        return Ok(());
    }

    let target = staging.join(BACKUP_DIR);
    let copied = copy_tree(&live_backups, &target).map_err(|e| {
        BackupError::Io(format!(
            "Failed to copy {} into staging: {}",
            live_backups.display(),
            e
        ))
    })?;
    debug!(copied, "preserved existing backups");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::manager::BackupManager;
    use crate::backup::swap::tests::FailingDirOps;
    use crate::error::SwapStage;
    use crate::outcome::Outcome;
    use std::collections::BTreeMap;
    use tempfile::TempDir;
    use walkdir::WalkDir;

    fn create_test_domain(temp: &TempDir, name: &str) -> PathBuf {
        let domain = temp.path().join(name);
        fs::create_dir_all(domain.join("config")).unwrap();
        fs::create_dir_all(domain.join("applications").join("empty")).unwrap();
        fs::create_dir_all(domain.join("lib").join("ext")).unwrap();
        fs::write(domain.join("config").join("domain.xml"), "<domain v=\"1\"/>").unwrap();
        fs::write(domain.join("lib").join("ext").join("driver.jar"), [0u8, 1, 2, 255]).unwrap();
        domain
    }

    /// Relative path -> contents (None for directories), skipping `backups`
    fn snapshot(root: &Path) -> BTreeMap<PathBuf, Option<Vec<u8>>> {
        WalkDir::new(root)
            .min_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| !e.path().strip_prefix(root).unwrap().starts_with("backups"))
            .map(|e| {
                let rel = e.path().strip_prefix(root).unwrap().to_path_buf();
                let contents = e.file_type().is_file().then(|| fs::read(e.path()).unwrap());
                (rel, contents)
            })
            .collect()
    }

    fn take_backup(temp: &TempDir, name: &str, config_only: bool) -> PathBuf {
        let request = BackupRequest::new(temp.path(), Some(name)).config_only(config_only);
        BackupManager::new(request).unwrap().store().unwrap().path
    }

    fn leftover_dirs(temp: &TempDir) -> Vec<String> {
        fs::read_dir(temp.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_restore_latest_round_trip() {
        let temp = TempDir::new().unwrap();
        let domain = create_test_domain(&temp, "sales");
        let before = snapshot(&domain);
        take_backup(&temp, "sales", false);

        fs::write(domain.join("config").join("domain.xml"), "changed").unwrap();
        fs::remove_dir_all(domain.join("applications")).unwrap();
        fs::write(domain.join("stray.log"), "new file").unwrap();

        let report = RestoreManager::new(BackupRequest::new(temp.path(), Some("sales")))
            .unwrap()
            .restore()
            .unwrap();

        assert_eq!(report.outcome, Outcome::Ok);
        assert!(report.message.contains("Restored domain sales"));
        assert_eq!(snapshot(&domain), before);
        assert!(!domain.join(PROPS_FILENAME).exists());
        assert_eq!(leftover_dirs(&temp), vec!["sales".to_string()]);
    }

    #[cfg(unix)]
    #[test]
    fn test_round_trip_keeps_symlinked_content() {
        use std::os::unix::fs::symlink;

        let temp = TempDir::new().unwrap();
        let domain = create_test_domain(&temp, "sales");
        let shared = TempDir::new().unwrap();
        fs::write(shared.path().join("driver.jar"), "shared driver").unwrap();
        symlink(shared.path().join("driver.jar"), domain.join("lib").join("driver.jar")).unwrap();
        take_backup(&temp, "sales", false);

        RestoreManager::new(BackupRequest::new(temp.path(), Some("sales")))
            .unwrap()
            .restore()
            .unwrap();

        assert_eq!(
            fs::read_to_string(domain.join("lib").join("driver.jar")).unwrap(),
            "shared driver"
        );
        assert!(shared.path().join("driver.jar").exists());
    }

    #[test]
    fn test_restore_into_fresh_domain() {
        let temp = TempDir::new().unwrap();
        let domain = create_test_domain(&temp, "sales");
        let before = snapshot(&domain);
        let archive = take_backup(&temp, "sales", false);

        let elsewhere = TempDir::new().unwrap();
        let saved = elsewhere.path().join("saved.zip");
        fs::copy(&archive, &saved).unwrap();

        let fresh = TempDir::new().unwrap();
        let request = BackupRequest::new(fresh.path(), None)
            .backup_file(&saved)
            .force(true);
        RestoreManager::new(request).unwrap().restore().unwrap();

        assert_eq!(snapshot(&fresh.path().join("sales")), before);
    }

    #[test]
    fn test_full_restore_keeps_newer_backups() {
        let temp = TempDir::new().unwrap();
        let domain = create_test_domain(&temp, "sales");
        let first = take_backup(&temp, "sales", false);
        let second = take_backup(&temp, "sales", false);

        let request = BackupRequest::new(temp.path(), Some("sales")).backup_file(&first);
        RestoreManager::new(request).unwrap().restore().unwrap();

        assert!(domain.join("backups").join(first.file_name().unwrap()).exists());
        assert!(domain.join("backups").join(second.file_name().unwrap()).exists());
    }

    #[test]
    fn test_config_only_restore() {
        let temp = TempDir::new().unwrap();
        let domain = create_test_domain(&temp, "sales");
        take_backup(&temp, "sales", true);

        fs::write(domain.join("config").join("domain.xml"), "changed").unwrap();
        fs::write(domain.join("applications").join("app.war"), "deployed").unwrap();

        let report = RestoreManager::new(BackupRequest::new(temp.path(), Some("sales")))
            .unwrap()
            .restore()
            .unwrap();

        assert!(report.message.contains("configuration"));
        assert_eq!(
            fs::read_to_string(domain.join("config").join("domain.xml")).unwrap(),
            "<domain v=\"1\"/>"
        );
        // Outside config is left alone
        assert!(domain.join("applications").join("app.war").exists());
        assert!(!domain.join("config").join(PROPS_FILENAME).exists());
    }

    #[test]
    fn test_config_only_request_rejects_full_backup() {
        let temp = TempDir::new().unwrap();
        let domain = create_test_domain(&temp, "sales");
        take_backup(&temp, "sales", false);
        fs::write(domain.join("applications").join("app.war"), "deployed").unwrap();

        let request = BackupRequest::new(temp.path(), Some("sales")).config_only(true);
        let err = RestoreManager::new(request).unwrap().restore().unwrap_err();

        assert!(matches!(err, BackupError::NotConfigOnlyBackup(_)));
        assert!(domain.join("applications").join("app.war").exists());
        assert_eq!(leftover_dirs(&temp), vec!["sales".to_string()]);
    }

    #[test]
    fn test_config_only_request_accepts_config_only_backup() {
        let temp = TempDir::new().unwrap();
        let domain = create_test_domain(&temp, "sales");
        take_backup(&temp, "sales", true);
        fs::write(domain.join("config").join("domain.xml"), "changed").unwrap();

        let request = BackupRequest::new(temp.path(), Some("sales")).config_only(true);
        let report = RestoreManager::new(request).unwrap().restore().unwrap();

        assert_eq!(report.outcome, Outcome::Ok);
        assert_eq!(
            fs::read_to_string(domain.join("config").join("domain.xml")).unwrap(),
            "<domain v=\"1\"/>"
        );
    }

    #[test]
    fn test_no_domain_name_without_force() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("does-not-exist");

        let err = RestoreManager::new(BackupRequest::new(&missing, None)).err().unwrap();
        assert!(matches!(
            err,
            BackupError::InvalidRequest(InvalidRequest::UseForceOption)
        ));
    }

    #[test]
    fn test_missing_domain_and_backup_dirs() {
        let temp = TempDir::new().unwrap();
        let err = RestoreManager::new(BackupRequest::new(temp.path(), Some("ghost")))
            .unwrap()
            .restore()
            .unwrap_err();
        assert!(matches!(err, BackupError::NoDomainDir(_)));

        create_test_domain(&temp, "sales");
        let err = RestoreManager::new(BackupRequest::new(temp.path(), Some("sales")))
            .unwrap()
            .restore()
            .unwrap_err();
        assert!(matches!(err, BackupError::NoBackupDir(_)));

        fs::create_dir(temp.path().join("sales").join("backups")).unwrap();
        let err = RestoreManager::new(BackupRequest::new(temp.path(), Some("sales")))
            .unwrap()
            .restore()
            .unwrap_err();
        assert!(matches!(err, BackupError::NoBackupsFound(_)));
    }

    #[test]
    fn test_empty_backup_file_is_corrupt() {
        let temp = TempDir::new().unwrap();
        create_test_domain(&temp, "sales");
        let empty = temp.path().join("empty.zip");
        fs::write(&empty, b"").unwrap();

        let request = BackupRequest::new(temp.path(), Some("sales")).backup_file(&empty);
        let err = RestoreManager::new(request).unwrap().restore().unwrap_err();
        assert!(matches!(err, BackupError::CorruptBackupFile { .. }));
    }

    #[test]
    fn test_domain_name_mismatch() {
        let temp = TempDir::new().unwrap();
        create_test_domain(&temp, "sales");
        let hr = create_test_domain(&temp, "hr");
        let archive = take_backup(&temp, "sales", false);

        let request = BackupRequest::new(temp.path(), Some("hr")).backup_file(&archive);
        let err = RestoreManager::new(request).unwrap().restore().unwrap_err();
        assert!(matches!(err, BackupError::DomainNameMismatch { .. }));

        let request = BackupRequest::new(temp.path(), Some("hr"))
            .backup_file(&archive)
            .force(true);
        RestoreManager::new(request).unwrap().restore().unwrap();
        assert!(hr.join("config").join("domain.xml").exists());
    }

    #[test]
    fn test_archive_without_metadata_file_is_rejected() {
        let temp = TempDir::new().unwrap();
        let domain = create_test_domain(&temp, "sales");
        let before = snapshot(&domain);

        // Metadata readable from the archive, but no file lands at the root
        let archive_path = temp.path().join("odd.zip");
        let src = temp.path().join("src");
        fs::create_dir(&src).unwrap();
        let extra = [archive::ExtraEntry {
            name: "nested/backup.properties",
            contents: b"domain.name=sales\ntimestamp.millis=1\n",
        }];
        archive::create(&archive_path, &src, &[], &[], &extra).unwrap();
        let plan = RestorePlan {
            archive: archive_path,
            domain_name: "sales".into(),
            layout: DomainLayout::new(&domain),
            status: Status::parse("domain.name=sales\ntimestamp.millis=1\n"),
        };

        let manager = RestoreManager::new(BackupRequest::new(temp.path(), Some("sales"))).unwrap();
        let err = manager.expand_to_staging(&plan).unwrap_err();
        assert!(matches!(err, BackupError::CorruptBackupFile { .. }));

        assert_eq!(snapshot(&domain), before);
        let mut names = leftover_dirs(&temp);
        names.sort();
        assert_eq!(names, vec!["odd.zip", "sales", "src"]);
    }

    #[test]
    fn test_retire_failure_leaves_domain_untouched() {
        let temp = TempDir::new().unwrap();
        let domain = create_test_domain(&temp, "sales");
        take_backup(&temp, "sales", false);
        fs::write(domain.join("config").join("domain.xml"), "current").unwrap();
        let before = snapshot(&domain);

        let request = BackupRequest::new(temp.path(), Some("sales"));
        let err = RestoreManager::with_dir_ops(request, FailingDirOps::new(&[1]))
            .unwrap()
            .restore()
            .unwrap_err();

        assert!(matches!(
            err,
            BackupError::SwapRenameFailure {
                stage: SwapStage::RetireOriginal,
                ..
            }
        ));
        assert_eq!(snapshot(&domain), before);
        assert_eq!(leftover_dirs(&temp), vec!["sales".to_string()]);
    }

    #[test]
    fn test_promote_failure_is_rolled_back() {
        let temp = TempDir::new().unwrap();
        let domain = create_test_domain(&temp, "sales");
        take_backup(&temp, "sales", false);
        fs::write(domain.join("config").join("domain.xml"), "current").unwrap();
        let before = snapshot(&domain);

        let request = BackupRequest::new(temp.path(), Some("sales"));
        let err = RestoreManager::with_dir_ops(request, FailingDirOps::new(&[2]))
            .unwrap()
            .restore()
            .unwrap_err();

        assert!(err.is_recoverable());
        assert_eq!(snapshot(&domain), before);
        assert_eq!(leftover_dirs(&temp), vec!["sales".to_string()]);
    }

    #[test]
    fn test_failed_rollback_is_unrecoverable() {
        let temp = TempDir::new().unwrap();
        create_test_domain(&temp, "sales");
        take_backup(&temp, "sales", false);

        let request = BackupRequest::new(temp.path(), Some("sales"));
        let err = RestoreManager::with_dir_ops(request, FailingDirOps::new(&[2, 3]))
            .unwrap()
            .restore()
            .unwrap_err();

        assert!(matches!(err, BackupError::SwapUnrecoverable { .. }));
        assert!(leftover_dirs(&temp)
            .iter()
            .any(|n| n.starts_with("sales_beforeRestore_")));
    }

    #[test]
    fn test_retired_cleanup_failure_is_a_warning() {
        let temp = TempDir::new().unwrap();
        let domain = create_test_domain(&temp, "sales");
        take_backup(&temp, "sales", false);
        fs::write(domain.join("config").join("domain.xml"), "current").unwrap();

        let request = BackupRequest::new(temp.path(), Some("sales"));
        let ops = FailingDirOps::new(&[]).failing_retired_removal();
        let report = RestoreManager::with_dir_ops(request, ops)
            .unwrap()
            .restore()
            .unwrap();

        assert_eq!(report.outcome, Outcome::Warning);
        assert_eq!(report.warnings.len(), 1);
        assert!(report.message.contains("Restored domain sales"));
        assert_eq!(
            fs::read_to_string(domain.join("config").join("domain.xml")).unwrap(),
            "<domain v=\"1\"/>"
        );
        assert!(leftover_dirs(&temp)
            .iter()
            .any(|n| n.starts_with("sales_beforeRestore_")));
    }

    #[test]
    fn test_verbose_and_terse_messages() {
        let temp = TempDir::new().unwrap();
        create_test_domain(&temp, "sales");
        take_backup(&temp, "sales", false);

        let request = BackupRequest::new(temp.path(), Some("sales")).terse(true);
        let report = RestoreManager::new(request).unwrap().restore().unwrap();
        assert!(report.message.is_empty());

        let request = BackupRequest::new(temp.path(), Some("sales")).verbose(true);
        let report = RestoreManager::new(request).unwrap().restore().unwrap();
        assert!(report.message.contains("Domain name: sales"));
        assert!(report.pending_cleanup.is_empty());
    }
}

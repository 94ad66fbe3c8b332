//! Backup and restore requests
//!
//! A [`BackupRequest`] carries every input of one operation. It is checked
//! once by [`RequestContext::validate`], which also fills in the computed
//! fields; after that the request is read-only.

use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Local};

use crate::config::paths::{DomainLayout, BACKUP_DIR};
use crate::config::Settings;
use crate::error::{BackupResult, InvalidRequest};

/// Inputs of one backup, restore or list operation
#[derive(Debug, Clone, Default)]
pub struct BackupRequest {
    /// Directory holding the domains
    pub domains_dir: PathBuf,
    /// Domain to operate on; restore may take it from the archive under `force`
    pub domain_name: Option<String>,
    /// Explicit backup-store root
    pub backup_dir: Option<PathBuf>,
    /// Backup-store profile subdirectory
    pub backup_profile: Option<String>,
    /// Explicit archive to restore
    pub backup_file: Option<PathBuf>,
    /// Number of archives to keep; 0 or less keeps all of them
    pub recycle_limit: i32,
    pub description: Option<String>,
    pub terse: bool,
    pub verbose: bool,
    pub force: bool,
    pub config_only: bool,
}

impl BackupRequest {
    /// Create a request for `domain_name` under `domains_dir`
    pub fn new(domains_dir: impl Into<PathBuf>, domain_name: Option<&str>) -> Self {
        Self {
            domains_dir: domains_dir.into(),
            domain_name: domain_name.map(str::to_string),
            ..Self::default()
        }
    }

    /// Fill unset store location, profile and retention from settings
    pub fn with_settings(mut self, settings: &Settings) -> Self {
        if self.backup_dir.is_none() {
            self.backup_dir = settings.backup_dir.clone();
        }
        if self.backup_profile.is_none() {
            self.backup_profile = settings.backup_profile.clone();
        }
        if self.recycle_limit == 0 {
            self.recycle_limit = settings.recycle_limit;
        }
        self
    }

    pub fn backup_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.backup_dir = Some(dir.into());
        self
    }

    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.backup_profile = Some(profile.into());
        self
    }

    pub fn backup_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.backup_file = Some(file.into());
        self
    }

    pub fn recycle_limit(mut self, limit: i32) -> Self {
        self.recycle_limit = limit;
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn terse(mut self, terse: bool) -> Self {
        self.terse = terse;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn config_only(mut self, config_only: bool) -> Self {
        self.config_only = config_only;
        self
    }
}

/// A validated request plus the fields computed during validation
#[derive(Debug, Clone)]
pub struct RequestContext {
    request: BackupRequest,
    layout: Option<DomainLayout>,
    timestamp: DateTime<Local>,
}

impl RequestContext {
    /// Check a request and compute the domain directory and creation time
    ///
    /// Only reads the filesystem; nothing is created or modified.
    pub fn validate(request: BackupRequest) -> BackupResult<Self> {
        if !request.domains_dir.is_dir() {
            return Err(InvalidRequest::NoDomainsDir(request.domains_dir.clone()).into());
        }

        let layout = match request.domain_name.as_deref() {
            Some(name) => {
                check_domain_name(name)?;
                Some(DomainLayout::in_domains_dir(&request.domains_dir, name))
            }
            None => None,
        };

        if let Some(profile) = request.backup_profile.as_deref() {
            check_domain_name(profile)?;
        }

        Ok(Self {
            request,
            layout,
            timestamp: Local::now(),
        })
    }

    pub fn request(&self) -> &BackupRequest {
        &self.request
    }

    /// Layout of the requested domain, if a domain name was given
    pub fn layout(&self) -> Option<&DomainLayout> {
        self.layout.as_ref()
    }

    pub fn domain_name(&self) -> Option<&str> {
        self.request.domain_name.as_deref()
    }

    pub fn timestamp(&self) -> DateTime<Local> {
        self.timestamp
    }

    /// Layout and name of the requested domain, or an error if none was given
    pub fn require_domain(&self) -> BackupResult<(&str, &DomainLayout)> {
        match (self.domain_name(), self.layout()) {
            (Some(name), Some(layout)) => Ok((name, layout)),
            _ => Err(InvalidRequest::MissingDomainName.into()),
        }
    }

    /// The backup-store directory for `domain_name` living in `domain_dir`
    pub fn backup_store_dir(&self, domain_dir: &Path, domain_name: &str) -> PathBuf {
        resolve_backup_dir(
            domain_dir,
            domain_name,
            self.request.backup_dir.as_deref(),
            self.request.backup_profile.as_deref(),
        )
    }
}

/// Compute where archives for a domain live
///
/// | explicit store | profile | result                        |
/// |----------------|---------|-------------------------------|
/// | no             | no      | `domain_dir/backups`          |
/// | no             | yes     | `domain_dir/backups/profile`  |
/// | yes            | yes     | `store/domain_name/profile`   |
/// | yes            | no      | `store/domain_name`           |
pub fn resolve_backup_dir(
    domain_dir: &Path,
    domain_name: &str,
    backup_dir: Option<&Path>,
    profile: Option<&str>,
) -> PathBuf {
    let base = match backup_dir {
        Some(store) => store.join(domain_name),
        None => domain_dir.join(BACKUP_DIR),
    };

    match profile {
        Some(profile) => base.join(profile),
        None => base,
    }
}

/// Reject names that are not exactly one normal path component
pub(crate) fn check_domain_name(name: &str) -> BackupResult<()> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(InvalidRequest::BadDomainName(name.to_string()).into()),
    }
}

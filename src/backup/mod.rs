//! Versioned domain backups and transactional restore
//!
//! # Architecture
//!
//! - `BackupManager`: writes one versioned archive and recycles old ones
//! - `RestoreManager`: expands an archive into staging and swaps it into place
//! - `ListManager`: lists the archives of a domain
//! - `FilenameManager`: version index over one backup-store directory
//!
//! # Archive Format
//!
//! Archives are zip files named `{domain}_{YYYY_MM_DD}_v{NNNNN}.zip`. Each one
//! holds the domain tree (or only its `config` subtree) plus a
//! `backup.properties` metadata file at the root.
//!
//! # Example
//!
//! ```rust,ignore
//! use domain_backup::backup::{BackupManager, BackupRequest, RestoreManager};
//!
//! let request = BackupRequest::new("/srv/domains", Some("sales")).recycle_limit(10);
//! let report = BackupManager::new(request.clone())?.backup()?;
//! println!("{}", report.message);
//!
//! // Later, restore the newest archive
//! let report = RestoreManager::new(request)?.restore()?;
//! ```

pub mod archive;
mod filename;
mod fs_util;
mod list;
mod manager;
pub mod permissions;
mod request;
mod restore;
mod status;
pub mod swap;

pub use filename::{format_filename, parse_version, BackupFile, FilenameManager, VERSION_LIMIT};
pub use list::{ListManager, ListedBackup};
pub use manager::{BackupInfo, BackupManager};
pub use request::{resolve_backup_dir, BackupRequest, RequestContext};
pub use restore::RestoreManager;
pub use status::{BackupKind, Status};
pub use swap::{AtomicSwap, DirOps, StdDirOps};

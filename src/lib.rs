//! domain-backup - Versioned snapshots and transactional restore of server domains
//!
//! This library backs up a server domain directory (or only its `config`
//! subtree) into versioned zip archives and restores a domain from one of
//! them, swapping the restored tree into place so that a failed restore
//! leaves the original domain untouched.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - `config`: Domain layout, settings and path management
//! - `error`: Custom error types
//! - `outcome`: Ok / warning / failure reports
//! - `backup`: Backup, restore and list operations
//! - `cli`: Command handlers for the binary
//! - `display`: Terminal formatting
//!
//! # Example
//!
//! ```rust,ignore
//! use domain_backup::backup::{BackupManager, BackupRequest};
//!
//! let request = BackupRequest::new("/srv/domains", Some("sales"));
//! let report = BackupManager::new(request)?.backup()?;
//! ```

pub mod backup;
pub mod cli;
pub mod config;
pub mod display;
pub mod error;
pub mod outcome;

pub use error::{BackupError, BackupResult};
pub use outcome::{Outcome, Report};

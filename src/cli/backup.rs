//! Backup CLI commands
//!
//! Implements the `backup`, `restore` and `list` commands, turning flags
//! into a [`BackupRequest`] and the result into a [`Report`].

use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::backup::{BackupManager, BackupRequest, ListManager, RestoreManager};
use crate::config::settings::Settings;
use crate::display::format_backup_list;
use crate::error::BackupResult;
use crate::outcome::Report;

/// Flags shared by every command
#[derive(Args, Debug, Clone, Default)]
pub struct DomainArgs {
    /// Domain to operate on
    pub domain_name: Option<String>,

    /// Directory holding the domains (defaults to settings, then the current directory)
    #[arg(long = "domaindir", env = "DOMAIN_BACKUP_DOMAINS_DIR")]
    pub domains_dir: Option<PathBuf>,

    /// Backup-store root; archives go under {backupdir}/{domain}
    #[arg(long = "backupdir")]
    pub backup_dir: Option<PathBuf>,

    /// Backup-store profile subdirectory
    #[arg(long, alias = "backupconfig")]
    pub profile: Option<String>,

    /// Print details about the operation
    #[arg(short, long)]
    pub verbose: bool,

    /// Print nothing on success
    #[arg(short, long, conflicts_with = "verbose")]
    pub terse: bool,
}

/// Backup subcommands
#[derive(Subcommand, Debug)]
pub enum BackupCommands {
    /// Take a versioned snapshot of a domain
    Backup {
        #[command(flatten)]
        domain: DomainArgs,

        /// Free-text description stored in the archive
        #[arg(long)]
        description: Option<String>,

        /// Only archive the config subtree
        #[arg(long = "configonly")]
        config_only: bool,

        /// Keep at most this many archives; 0 keeps all
        #[arg(long = "recyclelimit")]
        recycle_limit: Option<i32>,
    },

    /// Restore a domain from a snapshot
    Restore {
        #[command(flatten)]
        domain: DomainArgs,

        /// Archive to restore instead of the newest one
        #[arg(long = "filename")]
        backup_file: Option<PathBuf>,

        /// Allow a mismatched or archive-provided domain name
        #[arg(short, long)]
        force: bool,

        /// Require a configuration-only backup; a full backup is refused
        #[arg(long = "configonly")]
        config_only: bool,
    },

    /// List the snapshots of a domain
    List {
        #[command(flatten)]
        domain: DomainArgs,
    },
}

impl BackupCommands {
    pub fn domain_args(&self) -> &DomainArgs {
        match self {
            Self::Backup { domain, .. } | Self::Restore { domain, .. } | Self::List { domain } => domain,
        }
    }
}

/// Handle a backup command
pub fn handle_backup_command(settings: &Settings, cmd: BackupCommands) -> BackupResult<Report> {
    match cmd {
        BackupCommands::Backup {
            domain,
            description,
            config_only,
            recycle_limit,
        } => {
            let mut request = build_request(settings, &domain).config_only(config_only);
            if let Some(description) = description {
                request = request.description(description);
            }
            if let Some(limit) = recycle_limit {
                request = request.recycle_limit(limit);
            }
            BackupManager::new(request)?.backup()
        }

        BackupCommands::Restore {
            domain,
            backup_file,
            force,
            config_only,
        } => {
            let mut request = build_request(settings, &domain)
                .force(force)
                .config_only(config_only);
            if let Some(file) = backup_file {
                request = request.backup_file(file);
            }
            RestoreManager::new(request)?.restore()
        }

        BackupCommands::List { domain } => {
            let request = build_request(settings, &domain);
            let (mut report, backups) = ListManager::new(request)?.report()?;
            if !backups.is_empty() {
                report.message = format_backup_list(&backups, domain.verbose);
            }
            Ok(report)
        }
    }
}

/// Flags first, then settings, then defaults
fn build_request(settings: &Settings, args: &DomainArgs) -> BackupRequest {
    let domains_dir = args
        .domains_dir
        .clone()
        .or_else(|| settings.domains_dir.clone())
        .unwrap_or_else(|| PathBuf::from("."));

    let mut request = BackupRequest::new(domains_dir, args.domain_name.as_deref())
        .verbose(args.verbose)
        .terse(args.terse);
    if let Some(dir) = &args.backup_dir {
        request = request.backup_dir(dir);
    }
    if let Some(profile) = &args.profile {
        request = request.profile(profile);
    }
    request.with_settings(settings)
}

//! Settings CLI command
//!
//! Shows the stored settings and, when any flag is given, updates and
//! saves them.

use clap::Args;
use std::path::{Path, PathBuf};

use crate::config::settings::Settings;
use crate::error::BackupResult;
use crate::outcome::Report;

/// Settings to change; none given means show only
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// Default directory holding the domains
    #[arg(long = "domaindir")]
    pub domains_dir: Option<PathBuf>,

    /// Default backup-store root
    #[arg(long = "backupdir")]
    pub backup_dir: Option<PathBuf>,

    /// Default backup-store profile
    #[arg(long)]
    pub profile: Option<String>,

    /// Default number of archives to keep; 0 keeps all
    #[arg(long = "recyclelimit")]
    pub recycle_limit: Option<i32>,
}

impl ConfigArgs {
    /// Copy the given flags into `settings`, returning whether anything changed
    fn apply(self, settings: &mut Settings) -> bool {
        let mut changed = false;
        if let Some(dir) = self.domains_dir {
            settings.domains_dir = Some(dir);
            changed = true;
        }
        if let Some(dir) = self.backup_dir {
            settings.backup_dir = Some(dir);
            changed = true;
        }
        if let Some(profile) = self.profile {
            settings.backup_profile = Some(profile);
            changed = true;
        }
        if let Some(limit) = self.recycle_limit {
            settings.recycle_limit = limit;
            changed = true;
        }
        changed
    }
}

/// Handle the config command
pub fn handle_config_command(path: &Path, mut settings: Settings, args: ConfigArgs) -> BackupResult<Report> {
    if args.apply(&mut settings) {
        settings.save(path)?;
    }
    Ok(Report::ok(format_settings(path, &settings)))
}

fn format_settings(path: &Path, settings: &Settings) -> String {
    let show = |value: Option<String>| value.unwrap_or_else(|| "(not set)".to_string());

    format!(
        "Settings file:     {}\nDomains directory: {}\nBackup directory:  {}\nBackup profile:    {}\nRecycle limit:     {}",
        path.display(),
        show(settings.domains_dir.as_ref().map(|d| d.display().to_string())),
        show(settings.backup_dir.as_ref().map(|d| d.display().to_string())),
        show(settings.backup_profile.clone()),
        settings.recycle_limit,
    )
}

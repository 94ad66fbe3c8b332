//! Backup listing display formatting

use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::backup::ListedBackup;

#[derive(Tabled)]
struct BackupRow {
    #[tabled(rename = "Version")]
    version: u64,
    #[tabled(rename = "File")]
    file: String,
    #[tabled(rename = "Profile")]
    profile: String,
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Taken")]
    taken: String,
}

#[derive(Tabled)]
struct VerboseBackupRow {
    #[tabled(inline)]
    base: BackupRow,
    #[tabled(rename = "User")]
    user: String,
    #[tabled(rename = "Description")]
    description: String,
}

/// Format listed backups as a table
///
/// The verbose form adds the user and description columns.
pub fn format_backup_list(backups: &[ListedBackup], verbose: bool) -> String {
    if backups.is_empty() {
        return "No backups found.".to_string();
    }

    let mut table = if verbose {
        Table::new(backups.iter().map(|b| VerboseBackupRow {
            base: row(b),
            user: b.status.user_name.clone(),
            description: b.status.description.clone(),
        }))
    } else {
        Table::new(backups.iter().map(row))
    };
    table.with(Style::psql());

    format!("{}\n\nTotal: {} backup(s)", table, backups.len())
}

fn row(backup: &ListedBackup) -> BackupRow {
    let taken = backup
        .status
        .taken_at()
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "unknown".to_string());

    BackupRow {
        version: backup.version,
        file: backup.filename.clone(),
        profile: backup.profile.clone().unwrap_or_else(|| "-".to_string()),
        kind: backup.status.kind().to_string(),
        taken,
    }
}

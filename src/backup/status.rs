//! Backup metadata (`backup.properties`)
//!
//! Every archive carries a small `key=value` file at its root recording when
//! it was taken, from which domain, by whom, and whether it holds the full
//! domain or only its configuration.

use std::fmt;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Local, TimeZone};

use crate::config::paths::PROPS_FILENAME;
use crate::error::{BackupError, BackupResult};

use super::archive;

const KEY_DESCRIPTION: &str = "description";
const KEY_TIMESTAMP_MILLIS: &str = "timestamp.millis";
const KEY_TIMESTAMP_HUMAN: &str = "timestamp.human";
const KEY_USER_NAME: &str = "user.name";
const KEY_DOMAINS_DIR: &str = "domains.dir";
const KEY_DOMAIN_NAME: &str = "domain.name";
const KEY_BACKUP_FILE: &str = "backup.file";
const KEY_BACKUP_TYPE: &str = "backup.type";

/// What an archive contains
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupKind {
    /// The whole domain directory
    Full,
    /// Only the domain's config subtree
    ConfigOnly,
}

impl BackupKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::ConfigOnly => "configonly",
        }
    }

    /// Interpret a stored type; archives without one predate config-only backups
    pub fn from_property(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            None | Some("") | Some("full") => Self::Full,
            Some(_) => Self::ConfigOnly,
        }
    }
}

impl fmt::Display for BackupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Contents of one `backup.properties` file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Status {
    pub description: String,
    /// Milliseconds since the epoch; 0 when missing or unparsable
    pub timestamp_millis: i64,
    pub user_name: String,
    pub domains_dir: String,
    pub domain_name: Option<String>,
    pub backup_file: String,
    pub backup_type: Option<String>,
}

impl Status {
    /// Metadata for a snapshot being taken now
    pub fn new(
        domain_name: &str,
        domains_dir: &Path,
        backup_file: &str,
        kind: BackupKind,
        taken_at: DateTime<Local>,
    ) -> Self {
        Self {
            description: String::new(),
            timestamp_millis: taken_at.timestamp_millis(),
            user_name: current_user(),
            domains_dir: domains_dir.display().to_string(),
            domain_name: Some(domain_name.to_string()),
            backup_file: backup_file.to_string(),
            backup_type: Some(kind.as_str().to_string()),
        }
    }

    pub fn kind(&self) -> BackupKind {
        BackupKind::from_property(self.backup_type.as_deref())
    }

    pub fn taken_at(&self) -> Option<DateTime<Local>> {
        if self.timestamp_millis <= 0 {
            return None;
        }
        Local.timestamp_millis_opt(self.timestamp_millis).single()
    }

    /// Read the metadata embedded in an archive
    pub fn read_archive(archive_path: &Path) -> BackupResult<Self> {
        let bytes = archive::read_entry(archive_path, PROPS_FILENAME)?
            .ok_or_else(|| BackupError::corrupt(archive_path, "no backup.properties entry"))?;
        Ok(Self::parse(&String::from_utf8_lossy(&bytes)))
    }

    /// Read a metadata file from disk
    pub fn read_file(path: &Path) -> BackupResult<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            BackupError::Io(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Ok(Self::parse(&contents))
    }

    /// Internal timestamp of an archive, or 0 if it has no usable metadata
    pub fn read_timestamp(archive_path: &Path) -> i64 {
        Self::read_archive(archive_path)
            .map(|status| status.timestamp_millis.max(0))
            .unwrap_or(0)
    }

    /// Parse `key=value` lines; unknown keys are ignored
    pub fn parse(contents: &str) -> Self {
        let mut status = Status::default();

        for line in contents.lines() {
            let line = line.trim_start();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = unescape(value);

            match key.trim() {
                KEY_DESCRIPTION => status.description = value,
                KEY_TIMESTAMP_MILLIS => status.timestamp_millis = value.trim().parse().unwrap_or(0),
                KEY_USER_NAME => status.user_name = value,
                KEY_DOMAINS_DIR => status.domains_dir = value,
                KEY_DOMAIN_NAME => status.domain_name = Some(value).filter(|v| !v.is_empty()),
                KEY_BACKUP_FILE => status.backup_file = value,
                KEY_BACKUP_TYPE => status.backup_type = Some(value),
                _ => {}
            }
        }

        status
    }

    /// Render as `key=value` lines
    pub fn to_properties(&self) -> String {
        let human = self
            .taken_at()
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default();

        let mut out = String::from("# domain backup metadata\n");
        let mut put = |key: &str, value: &str| {
            out.push_str(key);
            out.push('=');
            out.push_str(&escape(value));
            out.push('\n');
        };

        put(KEY_DESCRIPTION, &self.description);
        put(KEY_TIMESTAMP_MILLIS, &self.timestamp_millis.to_string());
        put(KEY_TIMESTAMP_HUMAN, &human);
        put(KEY_USER_NAME, &self.user_name);
        put(KEY_DOMAINS_DIR, &self.domains_dir);
        put(KEY_DOMAIN_NAME, self.domain_name.as_deref().unwrap_or(""));
        put(KEY_BACKUP_FILE, &self.backup_file);
        put(KEY_BACKUP_TYPE, self.backup_type.as_deref().unwrap_or(""));

        out
    }

    /// Multi-line human-readable summary
    pub fn summary(&self) -> String {
        let taken = self
            .taken_at()
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "unknown".to_string());

        format!(
            "Description: {}\nBackup file: {}\nDomain name: {}\nDomains directory: {}\nBackup type: {}\nTaken on: {}\nUser: {}",
            self.description,
            self.backup_file,
            self.domain_name.as_deref().unwrap_or(""),
            self.domains_dir,
            self.kind(),
            taken,
            self.user_name,
        )
    }
}

/// Login name of the current OS user
pub fn current_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string())
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out
}

fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

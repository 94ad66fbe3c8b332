//! Permission fixups after a restore
//!
//! Zip expansion does not carry platform permission bits, so well-known
//! parts of a restored domain get theirs re-applied. Failures are reported
//! as warnings and never undo the restore.

use std::io;
use std::path::Path;

use tracing::warn;

use crate::config::DomainLayout;
use crate::error::BackupError;

/// Re-apply permissions on a restored domain, returning any failures
pub fn fix_permissions(layout: &DomainLayout) -> Vec<BackupError> {
    let mut warnings = Vec::new();

    let mut record = |path: &Path, result: io::Result<()>| {
        if let Err(e) = result {
            warn!(path = %path.display(), error = %e, "permission fixup failed");
            warnings.push(BackupError::PermissionFixupWarning {
                path: path.to_path_buf(),
                reason: e.to_string(),
            });
        }
    };

    let bin = layout.bin_dir();
    record(&bin, make_executable(&bin));

    for path in [
        layout.backup_dir(),
        layout.config_dir(),
        layout.master_password_file(),
        layout.generated_tmp_dir(),
    ] {
        record(&path, protect(&path));
    }

    warnings
}

/// Make `path` (and everything under it) executable; missing paths are skipped
#[cfg(unix)]
pub fn make_executable(path: &Path) -> io::Result<()> {
    set_modes(path, 0o755, 0o755)
}

/// Restrict `path` (and everything under it) to its owner; missing paths are skipped
#[cfg(unix)]
pub fn protect(path: &Path) -> io::Result<()> {
    set_modes(path, 0o700, 0o600)
}

#[cfg(unix)]
fn set_modes(path: &Path, dir_mode: u32, file_mode: u32) -> io::Result<()> {
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use walkdir::WalkDir;

    if !path.exists() {
        return Ok(());
    }

    for entry in WalkDir::new(path) {
        let entry = entry.map_err(io::Error::from)?;
        let mode = if entry.file_type().is_dir() {
            dir_mode
        } else if entry.file_type().is_file() {
            file_mode
        } else {
            continue;
        };
        fs::set_permissions(entry.path(), fs::Permissions::from_mode(mode))?;
    }

    Ok(())
}

#[cfg(not(unix))]
pub fn make_executable(_path: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(not(unix))]
pub fn protect(_path: &Path) -> io::Result<()> {
    Ok(())
}

//! Filesystem helpers shared by backup and restore

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::warn;
use walkdir::WalkDir;

/// Recursively copy `src` into `dst`, creating `dst` if needed
///
/// Symlinks are followed and copied as regular files and directories.
/// Returns the number of files copied.
pub fn copy_tree(src: &Path, dst: &Path) -> io::Result<u64> {
    let mut copied = 0;
    fs::create_dir_all(dst)?;

    for entry in WalkDir::new(src).min_depth(1).follow_links(true) {
        let entry = entry.map_err(io::Error::from)?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        let target = dst.join(rel);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else if entry.file_type().is_file() {
            fs::copy(entry.path(), &target)?;
            copied += 1;
        }
    }

    Ok(copied)
}

/// Best-effort recursive delete; failures are logged, not returned
pub fn remove_tree(path: &Path) {
    if !path.exists() {
        return;
    }
    if let Err(e) = fs::remove_dir_all(path) {
        warn!(path = %path.display(), error = %e, "failed to remove directory");
    }
}

/// `{dir}/{stem}{millis}`, bumping `millis` until the name is unused
pub fn unique_path(dir: &Path, stem: &str, mut millis: i64) -> PathBuf {
    loop {
        let candidate = dir.join(format!("{}{}", stem, millis));
        if !candidate.exists() {
            return candidate;
        }
        millis += 1;
    }
}

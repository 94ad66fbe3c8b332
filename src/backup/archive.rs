//! Zip archive codec
//!
//! Creates an archive from a root directory plus an explicit list of
//! relative paths, and expands an archive into a directory. Directory
//! entries are written explicitly so empty directories survive a round trip.

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use tracing::warn;
use walkdir::WalkDir;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{BackupError, BackupResult};

/// Extra in-memory entry written at the archive root
pub struct ExtraEntry<'a> {
    pub name: &'a str,
    pub contents: &'a [u8],
}

/// List every file and directory under `root`, relative to it
///
/// Entries under any of the `excluded` relative prefixes are skipped,
/// including the excluded directories themselves. Symlinks are followed, so
/// a linked file or directory is listed as what it points at; a dangling
/// link or a link cycle is an error. The list is sorted so that parents
/// precede their children.
pub fn collect_entries(root: &Path, excluded: &[PathBuf]) -> BackupResult<Vec<PathBuf>> {
    let mut entries = Vec::new();

    let walker = WalkDir::new(root)
        .min_depth(1)
        .follow_links(true)
        .into_iter()
        .filter_entry(|entry| {
            entry
                .path()
                .strip_prefix(root)
                .map(|rel| !is_excluded(rel, excluded))
                .unwrap_or(false)
        });

    for entry in walker {
        let entry = entry.map_err(|e| {
            BackupError::Io(format!("Failed to walk {}: {}", root.display(), e))
        })?;
        if let Ok(rel) = entry.path().strip_prefix(root) {
            entries.push(rel.to_path_buf());
        }
    }

    entries.sort();
    Ok(entries)
}

/// Whether `rel` lies under one of the excluded prefixes
pub fn is_excluded(rel: &Path, excluded: &[PathBuf]) -> bool {
    excluded.iter().any(|prefix| rel.starts_with(prefix))
}

/// Write a zip archive at `archive_path`
///
/// `entries` are paths relative to `root`; anything under an `excluded`
/// prefix is skipped even if listed. `extra` entries are written last.
pub fn create(
    archive_path: &Path,
    root: &Path,
    entries: &[PathBuf],
    excluded: &[PathBuf],
    extra: &[ExtraEntry<'_>],
) -> BackupResult<()> {
    let write_failure = |reason: String| BackupError::ArchiveWriteFailure {
        path: archive_path.to_path_buf(),
        reason,
    };

    let file = File::create(archive_path).map_err(|e| write_failure(e.to_string()))?;
    let mut zip = ZipWriter::new(file);
    let file_options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .large_file(true);
    let dir_options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

    for rel in entries.iter().filter(|rel| !is_excluded(rel, excluded)) {
        let full = root.join(rel);
        let name = zip_name(rel);
        let metadata = fs::metadata(&full)
            .map_err(|e| write_failure(format!("{}: {}", full.display(), e)))?;

        if metadata.is_dir() {
            zip.add_directory(format!("{}/", name), dir_options)
                .map_err(|e| write_failure(e.to_string()))?;
        } else if metadata.is_file() {
            zip.start_file(name, file_options)
                .map_err(|e| write_failure(e.to_string()))?;
            let mut source = File::open(&full)
                .map_err(|e| write_failure(format!("{}: {}", full.display(), e)))?;
            io::copy(&mut source, &mut zip)
                .map_err(|e| write_failure(format!("{}: {}", full.display(), e)))?;
        } else {
            warn!(path = %full.display(), "skipping special file");
        }
    }

    for entry in extra {
        zip.start_file(entry.name, file_options)
            .map_err(|e| write_failure(e.to_string()))?;
        zip.write_all(entry.contents)
            .map_err(|e| write_failure(e.to_string()))?;
    }

    let file = zip.finish().map_err(|e| write_failure(e.to_string()))?;
    file.sync_all().map_err(|e| write_failure(e.to_string()))?;

    Ok(())
}

/// Expand every entry of `archive_path` under `target`
///
/// Entries whose names would escape `target` fail the whole expansion.
pub fn expand(archive_path: &Path, target: &Path) -> BackupResult<()> {
    let expand_failure = |reason: String| BackupError::ArchiveExpandFailure {
        path: archive_path.to_path_buf(),
        reason,
    };

    let file = File::open(archive_path).map_err(|e| expand_failure(e.to_string()))?;
    let mut archive = ZipArchive::new(file).map_err(|e| expand_failure(e.to_string()))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| expand_failure(e.to_string()))?;
        let rel = entry
            .enclosed_name()
            .ok_or_else(|| expand_failure(format!("unsafe entry name '{}'", entry.name())))?;
        let out_path = target.join(rel);

        if entry.is_dir() {
            fs::create_dir_all(&out_path)
                .map_err(|e| expand_failure(format!("{}: {}", out_path.display(), e)))?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| expand_failure(format!("{}: {}", parent.display(), e)))?;
        }
        let mut out = File::create(&out_path)
            .map_err(|e| expand_failure(format!("{}: {}", out_path.display(), e)))?;
        io::copy(&mut entry, &mut out)
            .map_err(|e| expand_failure(format!("{}: {}", out_path.display(), e)))?;
    }

    Ok(())
}

/// Read a single entry, or `None` if the archive has no such entry
pub fn read_entry(archive_path: &Path, name: &str) -> BackupResult<Option<Vec<u8>>> {
    let file = File::open(archive_path).map_err(|e| {
        BackupError::corrupt(archive_path, format!("cannot open: {}", e))
    })?;
    let mut archive = ZipArchive::new(file)
        .map_err(|e| BackupError::corrupt(archive_path, e.to_string()))?;

    let mut entry = match archive.by_name(name) {
        Ok(entry) => entry,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(e) => {
            warn!(archive = %archive_path.display(), error = %e, "unreadable archive entry");
            return Err(BackupError::corrupt(archive_path, e.to_string()));
        }
    };

    let mut contents = Vec::new();
    entry
        .read_to_end(&mut contents)
        .map_err(|e| BackupError::corrupt(archive_path, e.to_string()))?;
    Ok(Some(contents))
}

/// Zip entry name for a relative path, always `/`-separated
fn zip_name(rel: &Path) -> String {
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn populate(root: &Path) {
        fs::create_dir_all(root.join("config")).unwrap();
        fs::create_dir_all(root.join("empty").join("nested")).unwrap();
        fs::create_dir_all(root.join("backups")).unwrap();
        fs::create_dir_all(root.join("osgi-cache").join("felix")).unwrap();
        fs::write(root.join("config").join("domain.xml"), "<domain/>").unwrap();
        fs::write(root.join("backups").join("old.zip"), "zip").unwrap();
        fs::write(root.join("osgi-cache").join("felix").join("cache"), "x").unwrap();
    }

    #[test]
    fn test_collect_entries_excludes_prefixes() {
        let temp = TempDir::new().unwrap();
        populate(temp.path());

        let excluded = vec![PathBuf::from("backups"), PathBuf::from("osgi-cache")];
        let entries = collect_entries(temp.path(), &excluded).unwrap();

        assert!(entries.contains(&PathBuf::from("config/domain.xml")));
        assert!(entries.contains(&PathBuf::from("empty/nested")));
        assert!(!entries.iter().any(|e| e.starts_with("backups")));
        assert!(!entries.iter().any(|e| e.starts_with("osgi-cache")));
    }

    #[test]
    fn test_exclusion_is_per_component() {
        let excluded = vec![PathBuf::from("backups")];
        assert!(is_excluded(Path::new("backups/a.zip"), &excluded));
        assert!(!is_excluded(Path::new("backups-old/a.zip"), &excluded));
    }

    #[test]
    fn test_create_and_expand_keeps_empty_dirs() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("domain");
        populate(&root);

        let entries = collect_entries(&root, &[]).unwrap();
        let archive_path = temp.path().join("out.zip");
        let extra = [ExtraEntry {
            name: "backup.properties",
            contents: b"domain.name=sales\n",
        }];
        create(&archive_path, &root, &entries, &[PathBuf::from("backups")], &extra).unwrap();

        let target = temp.path().join("expanded");
        fs::create_dir(&target).unwrap();
        expand(&archive_path, &target).unwrap();

        assert!(target.join("empty").join("nested").is_dir());
        assert_eq!(
            fs::read_to_string(target.join("config").join("domain.xml")).unwrap(),
            "<domain/>"
        );
        assert!(target.join("backup.properties").is_file());
        assert!(!target.join("backups").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_are_archived_as_their_targets() {
        use std::os::unix::fs::symlink;

        let temp = TempDir::new().unwrap();
        let outside = temp.path().join("outside");
        fs::create_dir_all(outside.join("ext")).unwrap();
        fs::write(outside.join("driver.jar"), "jar").unwrap();
        fs::write(outside.join("ext").join("plugin.jar"), "plugin").unwrap();

        let root = temp.path().join("domain");
        fs::create_dir_all(root.join("lib")).unwrap();
        symlink(outside.join("driver.jar"), root.join("lib").join("driver.jar")).unwrap();
        symlink(outside.join("ext"), root.join("lib").join("ext")).unwrap();

        let entries = collect_entries(&root, &[]).unwrap();
        assert!(entries.contains(&PathBuf::from("lib/driver.jar")));
        assert!(entries.contains(&PathBuf::from("lib/ext/plugin.jar")));

        let archive_path = temp.path().join("out.zip");
        create(&archive_path, &root, &entries, &[], &[]).unwrap();

        let target = temp.path().join("expanded");
        fs::create_dir(&target).unwrap();
        expand(&archive_path, &target).unwrap();

        assert_eq!(fs::read_to_string(target.join("lib").join("driver.jar")).unwrap(), "jar");
        assert_eq!(
            fs::read_to_string(target.join("lib").join("ext").join("plugin.jar")).unwrap(),
            "plugin"
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_dangling_symlink_is_an_error() {
        use std::os::unix::fs::symlink;

        let temp = TempDir::new().unwrap();
        let root = temp.path().join("domain");
        fs::create_dir_all(&root).unwrap();
        symlink(temp.path().join("gone"), root.join("broken")).unwrap();

        assert!(collect_entries(&root, &[]).is_err());
    }

    #[test]
    fn test_read_entry() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("domain");
        fs::create_dir(&root).unwrap();
        let archive_path = temp.path().join("out.zip");
        let extra = [ExtraEntry {
            name: "backup.properties",
            contents: b"timestamp.millis=5\n",
        }];
        create(&archive_path, &root, &[], &[], &extra).unwrap();

        let found = read_entry(&archive_path, "backup.properties").unwrap();
        assert_eq!(found.as_deref(), Some(&b"timestamp.millis=5\n"[..]));
        assert!(read_entry(&archive_path, "missing").unwrap().is_none());
    }

    #[test]
    fn test_expand_garbage_fails() {
        let temp = TempDir::new().unwrap();
        let archive_path = temp.path().join("bad.zip");
        fs::write(&archive_path, b"definitely not a zip").unwrap();

        let err = expand(&archive_path, temp.path()).unwrap_err();
        assert!(matches!(err, BackupError::ArchiveExpandFailure { .. }));
    }
}

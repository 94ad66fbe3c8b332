//! Rename-based swap of a staged directory into a live location
//!
//! The swap runs three steps:
//!
//! 1. rename the live directory aside to a retired name
//! 2. rename the staged directory onto the live path
//! 3. delete the retired directory
//!
//! A failure in step 1 leaves the live tree untouched. A failure in step 2
//! renames the retired directory back; if that also fails the live path may
//! be empty and the error is [`BackupError::SwapUnrecoverable`]. A failure in
//! step 3 is only a warning: the restore is already committed.
//!
//! Renames are only atomic within one filesystem volume, so the staged,
//! live and retired paths must all live on the same volume.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use crate::error::{BackupError, BackupResult, SwapStage};

/// Directory operations used by the swap
pub trait DirOps {
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;
    fn remove_dir_all(&self, path: &Path) -> io::Result<()>;
}

/// [`DirOps`] backed by `std::fs`
#[derive(Debug, Default, Clone, Copy)]
pub struct StdDirOps;

impl DirOps for StdDirOps {
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)
    }

    fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::remove_dir_all(path)
    }
}

const RETIRED_SUFFIX: &str = "_beforeRestore_";

/// Sibling of `live` named `{name}_beforeRestore_{millis}`, unused on disk
pub fn retired_path(live: &Path, mut millis: i64) -> PathBuf {
    let name = live
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    loop {
        let candidate = live.with_file_name(format!("{}{}{}", name, RETIRED_SUFFIX, millis));
        if !candidate.exists() {
            return candidate;
        }
        millis += 1;
    }
}

/// Result of a committed swap
#[derive(Debug)]
pub struct SwapReport {
    /// Set when the retired directory could not be deleted
    pub cleanup_warning: Option<BackupError>,
}

enum SwapState {
    Start,
    LiveRetired,
    RollingBack(io::Error),
    Promoted,
}

/// One swap of `staging` onto `live`
#[derive(Debug)]
pub struct AtomicSwap<'a> {
    live: &'a Path,
    staging: &'a Path,
    retired: PathBuf,
}

impl<'a> AtomicSwap<'a> {
    pub fn new(live: &'a Path, staging: &'a Path, retired: PathBuf) -> Self {
        Self {
            live,
            staging,
            retired,
        }
    }

    /// Run the swap to one of its terminal outcomes
    ///
    /// The staging directory is gone on every exit: either renamed into
    /// place or deleted.
    pub fn run(self, ops: &dyn DirOps) -> BackupResult<SwapReport> {
        let mut state = SwapState::Start;

        loop {
            state = match state {
                SwapState::Start => match ops.rename(self.live, &self.retired) {
                    Ok(()) => SwapState::LiveRetired,
                    Err(e) => {
                        self.discard_staging(ops);
                        return Err(BackupError::SwapRenameFailure {
                            stage: SwapStage::RetireOriginal,
                            path: self.live.to_path_buf(),
                            reason: e.to_string(),
                        });
                    }
                },

                SwapState::LiveRetired => match ops.rename(self.staging, self.live) {
                    Ok(()) => SwapState::Promoted,
                    Err(e) => SwapState::RollingBack(e),
                },

                SwapState::RollingBack(cause) => {
                    self.discard_staging(ops);
                    return match ops.rename(&self.retired, self.live) {
                        Ok(()) => {
                            warn!(live = %self.live.display(), "restored directory could not be moved into place, original kept");
                            Err(BackupError::SwapRenameFailure {
                                stage: SwapStage::PromoteRestored,
                                path: self.live.to_path_buf(),
                                reason: cause.to_string(),
                            })
                        }
                        Err(e) => {
                            error!(
                                live = %self.live.display(),
                                retired = %self.retired.display(),
                                error = %e,
                                "could not revert original directory; manual recovery required"
                            );
                            Err(BackupError::SwapUnrecoverable {
                                live: self.live.to_path_buf(),
                                retired: self.retired.clone(),
                                reason: format!("{} (after: {})", e, cause),
                            })
                        }
                    };
                }

                SwapState::Promoted => {
                    info!(live = %self.live.display(), "restored directory swapped into place");
                    let cleanup_warning = ops.remove_dir_all(&self.retired).err().map(|e| {
                        warn!(retired = %self.retired.display(), error = %e, "failed to delete retired directory");
                        BackupError::Io(format!(
                            "Failed to delete {}: {}",
                            self.retired.display(),
                            e
                        ))
                    });
                    return Ok(SwapReport { cleanup_warning });
                }
            };
        }
    }

    fn discard_staging(&self, ops: &dyn DirOps) {
        if let Err(e) = ops.remove_dir_all(self.staging) {
            warn!(staging = %self.staging.display(), error = %e, "failed to delete staging directory");
        }
    }
}

//! Advisory run lock
//!
//! Two `qr run` processes against the same store would submit the same
//! outstanding slots twice. The lock lives at `<store root>/.qr.lock` and is
//! released when the guard is dropped.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use eyre::{Context, Result};
use fs2::FileExt;
use tracing::debug;

pub const LOCK_FILE: &str = ".qr.lock";

/// Held exclusive lock on a store root
#[derive(Debug)]
pub struct RunLock {
    _file: File,
    path: PathBuf,
}

impl RunLock {
    /// Take the lock without blocking; fails if another run holds it
    pub fn acquire(root: &Path) -> Result<Self> {
        debug!(?root, "RunLock::acquire: called");
        fs::create_dir_all(root).context(format!("Failed to create store root {}", root.display()))?;
        let path = root.join(LOCK_FILE);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .context(format!("Failed to open lock file {}", path.display()))?;

        if let Err(e) = file.try_lock_exclusive() {
            if e.kind() == fs2::lock_contended_error().kind() {
                return Err(eyre::eyre!("Another run holds {}", path.display()));
            }
            return Err(e).context(format!("Failed to lock {}", path.display()));
        }

        debug!(?path, "RunLock::acquire: locked");
        Ok(Self { _file: file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

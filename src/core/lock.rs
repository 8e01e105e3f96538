//! Build root lock management
//!
//! The isolated build root is a singleton: two runs building into it at the
//! same time would corrupt each other. An exclusive lock file next to the
//! root is held for the whole build phase. The lock dies with the process
//! holding it, so a file left behind by a crashed run never blocks.

use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::File;
use std::path::{Path, PathBuf};

fn lock_path_for(root: &Path) -> PathBuf {
    let mut name = root
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "buildroot".into());
    name.push(".recipe-update.lock");
    root.with_file_name(name)
}

/// Acquire an exclusive lock on a build root.
/// Returns a guard that releases the lock when dropped.
pub fn acquire_build_root_lock(root: &Path) -> Result<BuildRootLock> {
    let lock_path = lock_path_for(root);

    let lock_file = File::create(&lock_path)
        .with_context(|| format!("Failed to create lock file: {}", lock_path.display()))?;

    if lock_file.try_lock_exclusive().is_err() {
        return Err(anyhow::anyhow!(
            "Build root '{}' is already in use by another run. \
             If this is incorrect, delete '{}'",
            root.display(),
            lock_path.display()
        ));
    }

    Ok(BuildRootLock {
        _file: lock_file,
        path: lock_path,
    })
}

/// RAII guard for the build root lock - deletes the lock file when dropped
#[derive(Debug)]
pub struct BuildRootLock {
    _file: File,
    path: PathBuf,
}

impl Drop for BuildRootLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

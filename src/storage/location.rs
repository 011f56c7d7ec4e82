//! Store directory resolution, write check and stale lock cleanup

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::errors::{StorageError, StorageResult};

/// Name of the store subdirectory under the configured base directory
pub const STORE_DIR_NAME: &str = "pglite_db";

/// Marker written and removed by the write check
pub const WRITE_TEST_FILE: &str = ".write_test";

/// Process lock the engine leaves behind after an unclean shutdown
pub const LOCK_FILE: &str = "postmaster.pid";

/// Resolved store directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLocation {
    base: PathBuf,
    path: PathBuf,
}

impl StoreLocation {
    /// Resolve `<base>/pglite_db`, creating every missing directory.
    pub fn resolve(base: impl AsRef<Path>) -> StorageResult<Self> {
        let base = base.as_ref().to_path_buf();
        let path = base.join(STORE_DIR_NAME);

        fs::create_dir_all(&path).map_err(|source| StorageError::CreateDir {
            path: path.clone(),
            source,
        })?;

        Ok(Self { base, path })
    }

    /// Resolve the location and run the startup checks in order.
    pub fn prepare(base: impl AsRef<Path>) -> StorageResult<Self> {
        let location = Self::resolve(base)?;
        location.verify_writable()?;
        location.clear_stale_lock();
        info!(path = %location.path.display(), "store directory ready");
        Ok(location)
    }

    /// Configured base directory
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Store directory handed to the engine
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Synchronously write then delete a marker file.
    pub fn verify_writable(&self) -> StorageResult<()> {
        let marker = self.path.join(WRITE_TEST_FILE);
        let not_writable = |source| StorageError::NotWritable {
            path: self.path.clone(),
            source,
        };

        let mut file = fs::File::create(&marker).map_err(not_writable)?;
        file.write_all(b"ok").map_err(not_writable)?;
        file.sync_all().map_err(not_writable)?;
        drop(file);

        fs::remove_file(&marker).map_err(not_writable)?;
        Ok(())
    }

    /// Remove a leftover lock file. Returns true when one was removed.
    ///
    /// The file is kept while the process named on its first line is still
    /// running. Removal failures are logged and ignored.
    pub fn clear_stale_lock(&self) -> bool {
        let lock = self.path.join(LOCK_FILE);
        let contents = match fs::read_to_string(&lock) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return false,
            Err(e) => {
                warn!(path = %lock.display(), error = %e, "could not read lock file");
                return false;
            }
        };

        if let Some(pid) = lock_owner(&contents) {
            if process_alive(pid) {
                warn!(path = %lock.display(), pid, "lock file held by a running process, leaving it");
                return false;
            }
        }

        match fs::remove_file(&lock) {
            Ok(()) => {
                info!(path = %lock.display(), "removed stale lock file");
                true
            }
            Err(e) => {
                warn!(path = %lock.display(), error = %e, "could not remove stale lock file");
                false
            }
        }
    }
}

/// Process id on the first line of a lock file
fn lock_owner(contents: &str) -> Option<i32> {
    contents
        .lines()
        .next()?
        .trim()
        .parse::<i32>()
        .ok()
        .filter(|pid| *pid > 0)
}

#[cfg(unix)]
fn process_alive(pid: i32) -> bool {
    // Signal 0 checks existence without delivering anything
    let rc = unsafe { libc::kill(pid, 0) };
    rc == 0 || io::Error::last_os_error().raw_os_error() != Some(libc::ESRCH)
}

#[cfg(not(unix))]
fn process_alive(_pid: i32) -> bool {
    true
}

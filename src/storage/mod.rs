//! # Store Location
//!
//! Resolves and prepares the filesystem directory that holds the embedded
//! engine's persistent state.
//!
//! Startup order is fixed:
//! 1. Create `<base>/pglite_db` (and any missing parents)
//! 2. Write then delete a marker file to prove the mount is writable
//! 3. Remove a stale `postmaster.pid` left by an unclean shutdown
//!
//! A failed write check is fatal. Lock cleanup is best-effort: the engine's
//! own start step decides whether a lock is genuinely held.

mod errors;
mod location;

pub use errors::{StorageError, StorageResult};
pub use location::{StoreLocation, LOCK_FILE, STORE_DIR_NAME, WRITE_TEST_FILE};

//! Store location errors
//!
//! Every variant is fatal at startup: the process exits before listening.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for store location operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Store location errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// The store directory could not be created
    #[error("Failed to create store directory {path:?}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The write/delete smoke test failed
    #[error("Store directory {path:?} is not writable: {source}")]
    NotWritable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl StorageError {
    /// Path the failing operation was working on
    pub fn path(&self) -> &PathBuf {
        match self {
            StorageError::CreateDir { path, .. } => path,
            StorageError::NotWritable { path, .. } => path,
        }
    }
}

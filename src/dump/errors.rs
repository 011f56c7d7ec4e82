//! Dump errors

use thiserror::Error;

use crate::engine::QueryError;

/// Result type for dump operations
pub type DumpResult<T> = Result<T, DumpError>;

/// Export and import failures
#[derive(Debug, Clone, Error)]
pub enum DumpError {
    /// Reading the table list failed
    #[error("Failed to list tables: {0}")]
    ListTables(#[source] QueryError),

    /// Reading one table's definition or rows failed
    #[error("Failed to export table {table}: {source}")]
    Table {
        table: String,
        #[source]
        source: QueryError,
    },

    /// The submitted script failed
    #[error("{0}")]
    Import(#[source] QueryError),
}

impl DumpError {
    /// Underlying engine error
    pub fn query_error(&self) -> &QueryError {
        match self {
            DumpError::ListTables(e) => e,
            DumpError::Table { source, .. } => source,
            DumpError::Import(e) => e,
        }
    }
}

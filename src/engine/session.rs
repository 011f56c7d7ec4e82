//! Session abstraction
//!
//! A `Session` is the only way the HTTP layer talks to the engine. One
//! statement at a time; a `Transaction` owns the session until it is
//! committed, rolled back or dropped.

use std::future::Future;

use serde::Serialize;
use serde_json::{Map, Value};

use super::errors::QueryResult;
use super::value::SqlParam;

/// One result row: column name to JSON value, in column order
pub type Row = Map<String, Value>;

/// Result column description
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "dataTypeID")]
    pub data_type_id: u32,
}

impl Field {
    pub fn new(name: impl Into<String>, data_type_id: u32) -> Self {
        Self {
            name: name.into(),
            data_type_id,
        }
    }
}

/// Output of a single statement
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOutput {
    pub rows: Vec<Row>,
    pub fields: Vec<Field>,
    /// Rows touched as reported by the command tag
    pub affected_rows: Option<u64>,
}

impl QueryOutput {
    /// Output carrying only rows
    pub fn from_rows(rows: Vec<Row>) -> Self {
        Self {
            rows,
            ..Default::default()
        }
    }

    /// Number of returned rows
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// First row, if any
    pub fn first(&self) -> Option<&Row> {
        self.rows.first()
    }

    /// Take the first row, if any
    pub fn into_first(self) -> Option<Row> {
        self.rows.into_iter().next()
    }
}

/// Shared handle to the engine
pub trait Session: Send + Sync + 'static {
    /// Transaction type returned by [`Session::begin`]
    type Transaction: Transaction;

    /// Execute one statement with positional parameters (`$1`, `$2`, ...).
    fn execute(
        &self,
        sql: &str,
        params: &[SqlParam],
    ) -> impl Future<Output = QueryResult<QueryOutput>> + Send;

    /// Run SQL without parameters or result rows. May contain several
    /// statements separated by semicolons.
    ///
    /// On failure a `ROLLBACK` is issued before the session is released, so
    /// a transaction opened by the SQL itself does not outlive the call.
    fn run(&self, sql: &str) -> impl Future<Output = QueryResult<()>> + Send;

    /// Issue `BEGIN` and hold the session until the transaction ends.
    fn begin(&self) -> impl Future<Output = QueryResult<Self::Transaction>> + Send;
}

/// An open transaction
pub trait Transaction: Send + Sized {
    /// Execute one statement inside the transaction.
    fn execute(
        &mut self,
        sql: &str,
        params: &[SqlParam],
    ) -> impl Future<Output = QueryResult<QueryOutput>> + Send;

    /// Issue `COMMIT`.
    fn commit(self) -> impl Future<Output = QueryResult<()>> + Send;

    /// Issue `ROLLBACK`.
    fn rollback(self) -> impl Future<Output = QueryResult<()>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_serializes_type_id() {
        let field = Field::new("id", 23);
        let json = serde_json::to_value(&field).unwrap();
        assert_eq!(json, json!({"name": "id", "dataTypeID": 23}));
    }

    #[test]
    fn test_query_output_first_row() {
        let mut row = Row::new();
        row.insert("n".to_string(), json!(1));
        let output = QueryOutput::from_rows(vec![row.clone()]);

        assert_eq!(output.row_count(), 1);
        assert_eq!(output.first(), Some(&row));
        assert_eq!(output.into_first(), Some(row));
        assert!(QueryOutput::default().into_first().is_none());
    }
}

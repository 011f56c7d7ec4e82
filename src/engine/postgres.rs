//! Session over a single PostgreSQL client connection

use std::sync::Arc;

use futures_util::{pin_mut, TryStreamExt};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio_postgres::types::ToSql;
use serde_json::Value;
use tokio_postgres::{Client, SimpleQueryMessage};
use tracing::{debug, warn};

use super::errors::{QueryError, QueryResult};
use super::session::{Field, QueryOutput, Row, Session, Transaction};
use super::value::{decode_row, is_supported, SqlParam};

/// The shared session handle
///
/// Every statement takes the client lock, so statements from concurrent
/// requests queue here and execute one at a time.
#[derive(Clone)]
pub struct PgSession {
    client: Arc<Mutex<Client>>,
}

impl PgSession {
    pub fn new(client: Client) -> Self {
        Self {
            client: Arc::new(Mutex::new(client)),
        }
    }
}

async fn execute_on(client: &Client, sql: &str, params: &[SqlParam]) -> QueryResult<QueryOutput> {
    debug!(sql = %sql, params = params.len(), "execute");

    let statement = client.prepare(sql).await?;
    let columns = statement.columns();
    let fields: Vec<Field> = columns
        .iter()
        .map(|c| Field::new(c.name(), c.type_().oid()))
        .collect();

    let Some(unsupported) = columns.iter().find(|c| !is_supported(c.type_())) else {
        return query_prepared(client, &statement, params, fields).await;
    };
    debug!(column = %unsupported.name(), ty = %unsupported.type_(), "selecting columns as text");

    if accepts_wrapper(sql) {
        let shape: Vec<(&str, bool)> = columns
            .iter()
            .map(|c| (c.name(), is_supported(c.type_())))
            .collect();
        match client.prepare(&text_cast_wrapper(sql, &shape)).await {
            Ok(wrapped) => return query_prepared(client, &wrapped, params, fields).await,
            Err(e) if !params.is_empty() => return Err(e.into()),
            Err(e) => debug!(error = %e, "text wrapper rejected"),
        }
    }

    if params.is_empty() {
        simple_text(client, sql, fields).await
    } else {
        Err(QueryError::unsupported_type(
            unsupported.name(),
            unsupported.type_().name(),
        ))
    }
}

async fn query_prepared(
    client: &Client,
    statement: &tokio_postgres::Statement,
    params: &[SqlParam],
    fields: Vec<Field>,
) -> QueryResult<QueryOutput> {
    let stream = client
        .query_raw(statement, params.iter().map(|p| p as &(dyn ToSql + Sync)))
        .await?;
    pin_mut!(stream);

    let mut rows = Vec::new();
    while let Some(row) = stream.try_next().await? {
        rows.push(decode_row(&row)?);
    }

    Ok(QueryOutput {
        rows,
        fields,
        affected_rows: stream.rows_affected(),
    })
}

/// Statements that can sit inside a `WITH` clause
fn accepts_wrapper(sql: &str) -> bool {
    let sql = sql.trim_start();
    if sql.starts_with('(') {
        return true;
    }
    let keyword: String = sql
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect::<String>()
        .to_ascii_uppercase();
    matches!(
        keyword.as_str(),
        "SELECT" | "WITH" | "VALUES" | "TABLE" | "INSERT" | "UPDATE" | "DELETE"
    )
}

/// Re-select the statement's output with unsupported columns cast to text.
///
/// Output columns are renamed positionally inside the wrapper so duplicate
/// or unnamed columns survive, then aliased back to their original names.
fn text_cast_wrapper(sql: &str, columns: &[(&str, bool)]) -> String {
    let body = sql.trim_end().trim_end_matches(';');
    let inner: Vec<String> = (0..columns.len()).map(|i| format!("c{}", i)).collect();
    let outer: Vec<String> = columns
        .iter()
        .enumerate()
        .map(|(i, (name, supported))| {
            let cast = if *supported { "" } else { "::text" };
            format!("c{}{} AS \"{}\"", i, cast, name.replace('"', "\"\""))
        })
        .collect();
    format!(
        "WITH source ({}) AS (\n{}\n) SELECT {} FROM source",
        inner.join(", "),
        body,
        outer.join(", ")
    )
}

/// Run a parameterless statement over the text protocol, every value a string.
async fn simple_text(client: &Client, sql: &str, fields: Vec<Field>) -> QueryResult<QueryOutput> {
    let mut output = QueryOutput {
        fields,
        ..Default::default()
    };
    for message in client.simple_query(sql).await? {
        match message {
            SimpleQueryMessage::Row(row) => {
                let mut out = Row::with_capacity(row.len());
                for (idx, column) in row.columns().iter().enumerate() {
                    let value = row
                        .try_get(idx)?
                        .map(|v: &str| Value::String(v.to_string()))
                        .unwrap_or(Value::Null);
                    out.insert(column.name().to_string(), value);
                }
                output.rows.push(out);
            }
            SimpleQueryMessage::CommandComplete(n) => output.affected_rows = Some(n),
            _ => {}
        }
    }
    Ok(output)
}

async fn run_on(client: &Client, sql: &str) -> QueryResult<()> {
    debug!(bytes = sql.len(), "run");
    client.batch_execute(sql).await.map_err(QueryError::from)
}

impl Session for PgSession {
    type Transaction = PgTransaction;

    async fn execute(&self, sql: &str, params: &[SqlParam]) -> QueryResult<QueryOutput> {
        let client = self.client.lock().await;
        execute_on(&client, sql, params).await
    }

    async fn run(&self, sql: &str) -> QueryResult<()> {
        let client = self.client.lock().await;
        let result = run_on(&client, sql).await;
        if result.is_err() {
            // Outside a transaction this only draws a server warning
            if let Err(e) = client.batch_execute("ROLLBACK").await {
                warn!(error = %e, "rollback after failed run failed");
            }
        }
        result
    }

    async fn begin(&self) -> QueryResult<PgTransaction> {
        let client = self.client.clone().lock_owned().await;
        run_on(&client, "BEGIN").await?;
        Ok(PgTransaction {
            client: Some(client),
        })
    }
}

/// A transaction holding the session lock
///
/// Dropping an unfinished transaction rolls it back on a background task
/// that keeps the lock until the rollback completes.
pub struct PgTransaction {
    client: Option<OwnedMutexGuard<Client>>,
}

impl PgTransaction {
    async fn finish(mut self, sql: &str) -> QueryResult<()> {
        match self.client.take() {
            Some(client) => run_on(&client, sql).await,
            None => Err(QueryError::message("Transaction already finished")),
        }
    }
}

impl Transaction for PgTransaction {
    async fn execute(&mut self, sql: &str, params: &[SqlParam]) -> QueryResult<QueryOutput> {
        match self.client.as_deref() {
            Some(client) => execute_on(client, sql, params).await,
            None => Err(QueryError::message("Transaction already finished")),
        }
    }

    async fn commit(self) -> QueryResult<()> {
        self.finish("COMMIT").await
    }

    async fn rollback(self) -> QueryResult<()> {
        self.finish("ROLLBACK").await
    }
}

impl Drop for PgTransaction {
    fn drop(&mut self) {
        if let Some(client) = self.client.take() {
            warn!("transaction dropped while open, rolling back");
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                handle.spawn(async move {
                    if let Err(e) = client.batch_execute("ROLLBACK").await {
                        warn!(error = %e, "rollback of dropped transaction failed");
                    }
                });
            }
        }
    }
}

//! Atomic statement batches

use tracing::{debug, warn};

use super::errors::QueryResult;
use super::session::{QueryOutput, Session, Transaction};
use super::value::SqlParam;

/// A statement and its positional parameters
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<SqlParam>,
}

impl Statement {
    pub fn new(sql: impl Into<String>, params: Vec<SqlParam>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }
}

/// Run statements in order inside one transaction.
///
/// Any failure rolls the whole batch back and returns the failing
/// statement's error. A failing rollback is logged and otherwise ignored.
pub async fn run_transaction<S: Session>(
    session: &S,
    statements: &[Statement],
) -> QueryResult<Vec<QueryOutput>> {
    let mut tx = session.begin().await?;
    let mut outputs = Vec::with_capacity(statements.len());

    for (index, statement) in statements.iter().enumerate() {
        match tx.execute(&statement.sql, &statement.params).await {
            Ok(output) => outputs.push(output),
            Err(e) => {
                warn!(index, error = %e, "statement failed, rolling back transaction");
                if let Err(rollback) = tx.rollback().await {
                    warn!(error = %rollback, "rollback failed");
                }
                return Err(e);
            }
        }
    }

    tx.commit().await?;
    debug!(statements = statements.len(), "transaction committed");
    Ok(outputs)
}

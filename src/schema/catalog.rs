//! Catalog introspection

use serde::Serialize;
use serde_json::Value;

use crate::engine::{QueryResult, Row, Session, SqlParam};

/// Schema whose tables are exposed
pub const DEFAULT_SCHEMA: &str = "public";

const LIST_TABLES_SQL: &str =
    "SELECT tablename FROM pg_tables WHERE schemaname = $1 ORDER BY tablename";

const TABLE_COLUMNS_SQL: &str = "SELECT column_name, data_type, is_nullable, column_default
    FROM information_schema.columns
    WHERE table_schema = $1 AND table_name = $2
    ORDER BY ordinal_position";

const DATABASE_SIZE_SQL: &str =
    "SELECT pg_size_pretty(pg_database_size(current_database())) AS database_size";

const TABLE_SIZES_SQL: &str = "SELECT tablename AS table_name,
        pg_size_pretty(pg_total_relation_size(quote_ident(schemaname) || '.' || quote_ident(tablename))) AS size
    FROM pg_tables
    WHERE schemaname = $1
    ORDER BY tablename";

/// Storage usage summary
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatabaseStats {
    pub database_size: String,
    pub tables: Vec<Row>,
}

/// Names of all tables in the default schema
pub async fn list_tables<S: Session>(session: &S) -> QueryResult<Vec<String>> {
    let output = session
        .execute(LIST_TABLES_SQL, &[SqlParam::from(DEFAULT_SCHEMA)])
        .await?;
    Ok(output
        .rows
        .into_iter()
        .filter_map(|mut row| match row.remove("tablename") {
            Some(Value::String(name)) => Some(name),
            _ => None,
        })
        .collect())
}

/// Column metadata of one table; empty when the table does not exist
pub async fn table_columns<S: Session>(session: &S, table: &str) -> QueryResult<Vec<Row>> {
    let output = session
        .execute(
            TABLE_COLUMNS_SQL,
            &[SqlParam::from(DEFAULT_SCHEMA), SqlParam::from(table)],
        )
        .await?;
    Ok(output.rows)
}

/// Database and per-table sizes
pub async fn database_stats<S: Session>(session: &S) -> QueryResult<DatabaseStats> {
    let size = session.execute(DATABASE_SIZE_SQL, &[]).await?;
    let database_size = size
        .first()
        .and_then(|row| row.get("database_size"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let tables = session
        .execute(TABLE_SIZES_SQL, &[SqlParam::from(DEFAULT_SCHEMA)])
        .await?
        .rows;

    Ok(DatabaseStats {
        database_size,
        tables,
    })
}

/// Round-trip a trivial statement
pub async fn ping<S: Session>(session: &S) -> bool {
    session.execute("SELECT 1", &[]).await.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_statements_bind_the_schema() {
        for sql in [LIST_TABLES_SQL, TABLE_COLUMNS_SQL, TABLE_SIZES_SQL] {
            assert!(sql.contains("schema") && sql.contains("= $1"), "{}", sql);
            assert!(!sql.contains("'public'"), "{}", sql);
        }
        assert!(TABLE_COLUMNS_SQL.contains("table_name = $2"));
    }
}

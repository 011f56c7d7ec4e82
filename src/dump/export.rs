//! Catalog-driven export

use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use tracing::info;

use crate::engine::{Row, Session, SqlParam};
use crate::schema::DEFAULT_SCHEMA;

use super::errors::{DumpError, DumpResult};

const TABLES_SQL: &str = "SELECT tablename, quote_ident(tablename) AS quoted
    FROM pg_tables
    WHERE schemaname = $1
    ORDER BY tablename";

const COLUMNS_SQL: &str = "SELECT quote_ident(a.attname) AS column_name,
        format_type(a.atttypid, a.atttypmod) AS column_type,
        a.attnotnull AS not_null,
        quote_literal(pg_get_serial_sequence(
            quote_ident(n.nspname) || '.' || quote_ident(c.relname), a.attname)) AS sequence
    FROM pg_attribute a
    JOIN pg_class c ON c.oid = a.attrelid
    JOIN pg_namespace n ON n.oid = c.relnamespace
    WHERE n.nspname = $1 AND c.relname = $2 AND a.attnum > 0 AND NOT a.attisdropped
    ORDER BY a.attnum";

/// One column as read from the catalog, name already quoted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub data_type: String,
    pub not_null: bool,
    /// Owned sequence of a serial or identity column, as a quoted literal
    pub sequence: Option<String>,
}

impl ColumnDef {
    fn from_row(row: &Row) -> Option<Self> {
        Some(Self {
            name: row.get("column_name")?.as_str()?.to_string(),
            data_type: row.get("column_type")?.as_str()?.to_string(),
            not_null: row.get("not_null").and_then(Value::as_bool).unwrap_or(false),
            sequence: row
                .get("sequence")
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }

    fn definition(&self) -> String {
        if self.not_null {
            format!("{} {} NOT NULL", self.name, self.data_type)
        } else {
            format!("{} {}", self.name, self.data_type)
        }
    }
}

/// A finished export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dump {
    pub sql: String,
    pub tables: usize,
    pub rows: usize,
}

fn create_table_statement(table: &str, columns: &[ColumnDef]) -> String {
    let defs: Vec<String> = columns.iter().map(ColumnDef::definition).collect();
    format!("CREATE TABLE IF NOT EXISTS {} ({});", table, defs.join(", "))
}

fn row_select_statement(table: &str, columns: &[ColumnDef]) -> String {
    let literals: Vec<String> = columns
        .iter()
        .map(|c| format!("quote_nullable({})", c.name))
        .collect();
    format!(
        "SELECT concat_ws(', ', {}) AS row_values FROM {}",
        literals.join(", "),
        table
    )
}

fn insert_statement(table: &str, columns: &[ColumnDef], values: &str) -> String {
    let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({});",
        table,
        names.join(", "),
        values
    )
}

/// Move a column's sequence past the highest imported value.
///
/// Skipped by the engine when the target has no such sequence, as for
/// tables the script itself creates.
fn sequence_reset_statement(table: &str, column: &str, sequence: &str) -> String {
    format!(
        "SELECT setval(seq, COALESCE((SELECT max({}) FROM {}), 0) + 1, false) \
         FROM to_regclass({}) AS seq WHERE seq IS NOT NULL;",
        column, table, sequence
    )
}

/// Render every table of the default schema as a SQL script.
pub async fn export<S: Session>(session: &S) -> DumpResult<Dump> {
    let tables = session
        .execute(TABLES_SQL, &[SqlParam::from(DEFAULT_SCHEMA)])
        .await
        .map_err(DumpError::ListTables)?;

    let mut sql = String::new();
    sql.push_str("-- Database export\n");
    sql.push_str(&format!(
        "-- Generated at {}\n",
        Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
    ));

    let mut table_count = 0;
    let mut row_count = 0;

    for table in &tables.rows {
        let (Some(name), Some(quoted)) = (
            table.get("tablename").and_then(Value::as_str),
            table.get("quoted").and_then(Value::as_str),
        ) else {
            continue;
        };
        let table_error = |source| DumpError::Table {
            table: name.to_string(),
            source,
        };

        let columns: Vec<ColumnDef> = session
            .execute(
                COLUMNS_SQL,
                &[SqlParam::from(DEFAULT_SCHEMA), SqlParam::from(name)],
            )
            .await
            .map_err(table_error)?
            .rows
            .iter()
            .filter_map(ColumnDef::from_row)
            .collect();

        sql.push_str(&format!("\n-- Table: {}\n", name));
        sql.push_str(&create_table_statement(quoted, &columns));
        sql.push('\n');
        table_count += 1;

        if columns.is_empty() {
            continue;
        }

        let rows = session
            .execute(&row_select_statement(quoted, &columns), &[])
            .await
            .map_err(table_error)?;

        for row in &rows.rows {
            if let Some(values) = row.get("row_values").and_then(Value::as_str) {
                sql.push_str(&insert_statement(quoted, &columns, values));
                sql.push('\n');
                row_count += 1;
            }
        }

        for column in &columns {
            if let Some(sequence) = &column.sequence {
                sql.push_str(&sequence_reset_statement(quoted, &column.name, sequence));
                sql.push('\n');
            }
        }
    }

    info!(tables = table_count, rows = row_count, "export complete");

    Ok(Dump {
        sql,
        tables: table_count,
        rows: row_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns() -> Vec<ColumnDef> {
        vec![
            ColumnDef {
                name: "id".to_string(),
                data_type: "integer".to_string(),
                not_null: true,
                sequence: Some("'public.people_id_seq'".to_string()),
            },
            ColumnDef {
                name: "\"Display Name\"".to_string(),
                data_type: "character varying(80)".to_string(),
                not_null: false,
                sequence: None,
            },
        ]
    }

    #[test]
    fn test_create_table_statement() {
        assert_eq!(
            create_table_statement("people", &columns()),
            "CREATE TABLE IF NOT EXISTS people (id integer NOT NULL, \"Display Name\" character varying(80));"
        );
    }

    #[test]
    fn test_row_select_uses_engine_quoting() {
        assert_eq!(
            row_select_statement("people", &columns()),
            "SELECT concat_ws(', ', quote_nullable(id), quote_nullable(\"Display Name\")) AS row_values FROM people"
        );
    }

    #[test]
    fn test_insert_statement_lists_columns() {
        assert_eq!(
            insert_statement("people", &columns(), "'1', NULL"),
            "INSERT INTO people (id, \"Display Name\") VALUES ('1', NULL);"
        );
    }

    #[test]
    fn test_column_def_from_catalog_row() {
        let mut row = Row::new();
        row.insert("column_name".into(), "email".into());
        row.insert("column_type".into(), "text".into());
        row.insert("not_null".into(), true.into());

        let column = ColumnDef::from_row(&row).unwrap();
        assert_eq!(column.definition(), "email text NOT NULL");

        assert!(column.sequence.is_none());

        row.insert("sequence".into(), "'public.t_id_seq'".into());
        let column = ColumnDef::from_row(&row).unwrap();
        assert_eq!(column.sequence.as_deref(), Some("'public.t_id_seq'"));

        row.remove("column_type");
        assert!(ColumnDef::from_row(&row).is_none());
    }

    #[test]
    fn test_sequence_reset_statement() {
        assert_eq!(
            sequence_reset_statement("people", "id", "'public.people_id_seq'"),
            "SELECT setval(seq, COALESCE((SELECT max(id) FROM people), 0) + 1, false) \
             FROM to_regclass('public.people_id_seq') AS seq WHERE seq IS NOT NULL;"
        );
    }
}

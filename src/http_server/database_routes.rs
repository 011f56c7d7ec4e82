//! Database HTTP Routes
//!
//! Raw SQL, atomic batches, introspection, and SQL dump transfer.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Serialize;

use crate::dump;
use crate::engine::{self, Field, QueryOutput, Row, Session};
use crate::schema::{self, DatabaseStats};

use super::errors::{ApiError, ApiResult};
use super::request::{self, ImportRequest, QueryRequest, TransactionRequest};
use super::state::SharedState;

// ==================
// Response Types
// ==================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    pub success: bool,
    pub rows: Vec<Row>,
    pub row_count: usize,
    pub fields: Vec<Field>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affected_rows: Option<u64>,
}

impl From<QueryOutput> for QueryResponse {
    fn from(output: QueryOutput) -> Self {
        Self {
            success: true,
            row_count: output.row_count(),
            rows: output.rows,
            fields: output.fields,
            affected_rows: output.affected_rows,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementResult {
    pub rows: Vec<Row>,
    pub row_count: usize,
}

#[derive(Debug, Serialize)]
pub struct TransactionResponse {
    pub success: bool,
    pub results: Vec<StatementResult>,
}

#[derive(Debug, Serialize)]
pub struct TablesResponse {
    pub success: bool,
    pub tables: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSchemaResponse {
    pub success: bool,
    pub table_name: String,
    pub columns: Vec<Row>,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub success: bool,
    #[serde(flatten)]
    pub stats: DatabaseStats,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

// ==================
// Database Routes
// ==================

/// Create database routes
pub fn database_routes<S: Session>(state: SharedState<S>) -> Router {
    Router::new()
        // Query execution
        .route("/query", post(execute_query_handler::<S>))
        .route("/transaction", post(transaction_handler::<S>))
        // Introspection
        .route("/tables", get(list_tables_handler::<S>))
        .route("/tables/:name/schema", get(table_schema_handler::<S>))
        .route("/stats", get(stats_handler::<S>))
        // Dump transfer
        .route("/export", get(export_handler::<S>))
        .route("/import", post(import_handler::<S>))
        .with_state(state)
}

// ==================
// Query Execution Handlers
// ==================

async fn execute_query_handler<S: Session>(
    State(state): State<SharedState<S>>,
    body: Bytes,
) -> ApiResult<Json<QueryResponse>> {
    let QueryRequest(statement) = request::parse(&body)?;

    let output = state
        .session
        .execute(&statement.sql, &statement.params)
        .await
        .map_err(ApiError::Rejected)?;

    Ok(Json(QueryResponse::from(output)))
}

async fn transaction_handler<S: Session>(
    State(state): State<SharedState<S>>,
    body: Bytes,
) -> ApiResult<Json<TransactionResponse>> {
    let TransactionRequest(statements) = request::parse(&body)?;

    let outputs = engine::run_transaction(&state.session, &statements)
        .await
        .map_err(ApiError::Rejected)?;

    let results = outputs
        .into_iter()
        .map(|output| StatementResult {
            row_count: output.row_count(),
            rows: output.rows,
        })
        .collect();

    Ok(Json(TransactionResponse {
        success: true,
        results,
    }))
}

// ==================
// Introspection Handlers
// ==================

async fn list_tables_handler<S: Session>(
    State(state): State<SharedState<S>>,
) -> ApiResult<Json<TablesResponse>> {
    let tables = schema::list_tables(&state.session)
        .await
        .map_err(ApiError::Internal)?;

    Ok(Json(TablesResponse {
        success: true,
        tables,
    }))
}

async fn table_schema_handler<S: Session>(
    State(state): State<SharedState<S>>,
    Path(name): Path<String>,
) -> ApiResult<Json<TableSchemaResponse>> {
    let columns = schema::table_columns(&state.session, &name)
        .await
        .map_err(ApiError::Internal)?;

    Ok(Json(TableSchemaResponse {
        success: true,
        table_name: name,
        columns,
    }))
}

async fn stats_handler<S: Session>(
    State(state): State<SharedState<S>>,
) -> ApiResult<Json<StatsResponse>> {
    let stats = schema::database_stats(&state.session)
        .await
        .map_err(ApiError::Internal)?;

    Ok(Json(StatsResponse {
        success: true,
        stats,
    }))
}

// ==================
// Dump Handlers
// ==================

async fn export_handler<S: Session>(State(state): State<SharedState<S>>) -> ApiResult<Response> {
    let dump = dump::export(&state.session).await?;

    let disposition = format!(
        "attachment; filename=\"export-{}.sql\"",
        Utc::now().format("%Y%m%d%H%M%S")
    );

    Ok((
        [
            (header::CONTENT_TYPE, "application/sql".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        dump.sql,
    )
        .into_response())
}

async fn import_handler<S: Session>(
    State(state): State<SharedState<S>>,
    body: Bytes,
) -> ApiResult<Json<MessageResponse>> {
    let ImportRequest(sql) = request::parse(&body)?;

    dump::import(&state.session, &sql).await?;

    Ok(Json(MessageResponse {
        success: true,
        message: "SQL imported successfully".to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_response_counts_rows() {
        let mut row = Row::new();
        row.insert("n".into(), json!(1));
        let output = QueryOutput {
            rows: vec![row.clone(), row],
            fields: vec![Field::new("n", 23)],
            affected_rows: Some(2),
        };

        let json = serde_json::to_value(QueryResponse::from(output)).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["rowCount"], 2);
        assert_eq!(json["affectedRows"], 2);
        assert_eq!(json["fields"][0]["dataTypeID"], 23);
    }

    #[test]
    fn test_stats_response_is_flat() {
        let response = StatsResponse {
            success: true,
            stats: DatabaseStats {
                database_size: "8 MB".into(),
                tables: vec![],
            },
        };
        let json = serde_json::to_value(response).unwrap();
        assert_eq!(
            json,
            json!({"success": true, "database_size": "8 MB", "tables": []})
        );
    }
}

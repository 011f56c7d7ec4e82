//! Shared test utilities
//!
//! `ScriptedSession` stands in for the engine: every statement is recorded
//! in order and answered by a caller-supplied responder.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use pgbridge::engine::{
    Field, QueryOutput, QueryResult, Row, Session, SqlParam, Transaction,
};
use pgbridge::http_server::{build_router, AppState, HttpServerConfig};
use serde_json::Value;
use tower::ServiceExt;

// =============================================================================
// Scripted Session
// =============================================================================

type Responder = dyn Fn(&str, &[SqlParam]) -> QueryResult<QueryOutput> + Send + Sync;

#[derive(Clone)]
pub struct ScriptedSession {
    log: Arc<Mutex<Vec<String>>>,
    responder: Arc<Responder>,
}

impl ScriptedSession {
    pub fn new(
        responder: impl Fn(&str, &[SqlParam]) -> QueryResult<QueryOutput> + Send + Sync + 'static,
    ) -> Self {
        Self {
            log: Arc::new(Mutex::new(Vec::new())),
            responder: Arc::new(responder),
        }
    }

    /// Session that answers every statement with an empty result
    pub fn empty() -> Self {
        Self::new(|_, _| Ok(QueryOutput::default()))
    }

    /// Statements seen so far, in order
    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    fn respond(&self, sql: &str, params: &[SqlParam]) -> QueryResult<QueryOutput> {
        self.log.lock().unwrap().push(sql.to_string());
        (self.responder)(sql, params)
    }
}

impl Session for ScriptedSession {
    type Transaction = ScriptedTransaction;

    async fn execute(&self, sql: &str, params: &[SqlParam]) -> QueryResult<QueryOutput> {
        self.respond(sql, params)
    }

    async fn run(&self, sql: &str) -> QueryResult<()> {
        let result = self.respond(sql, &[]).map(|_| ());
        if result.is_err() {
            let _ = self.respond("ROLLBACK", &[]);
        }
        result
    }

    async fn begin(&self) -> QueryResult<ScriptedTransaction> {
        self.respond("BEGIN", &[])?;
        Ok(ScriptedTransaction {
            session: self.clone(),
        })
    }
}

pub struct ScriptedTransaction {
    session: ScriptedSession,
}

impl Transaction for ScriptedTransaction {
    async fn execute(&mut self, sql: &str, params: &[SqlParam]) -> QueryResult<QueryOutput> {
        self.session.respond(sql, params)
    }

    async fn commit(self) -> QueryResult<()> {
        self.session.respond("COMMIT", &[]).map(|_| ())
    }

    async fn rollback(self) -> QueryResult<()> {
        self.session.respond("ROLLBACK", &[]).map(|_| ())
    }
}

// =============================================================================
// Builders
// =============================================================================

/// Build a row from a JSON object literal
pub fn row(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        other => panic!("row must be an object, got {}", other),
    }
}

pub fn rows(values: Vec<Value>) -> QueryOutput {
    QueryOutput::from_rows(values.into_iter().map(row).collect())
}

pub fn with_fields(mut output: QueryOutput, fields: &[(&str, u32)]) -> QueryOutput {
    output.fields = fields
        .iter()
        .map(|(name, oid)| Field::new(*name, *oid))
        .collect();
    output
}

pub fn user_row(id: i64, name: &str, email: &str) -> Value {
    serde_json::json!({
        "id": id,
        "name": name,
        "email": email,
        "created_at": "2024-05-01T12:30:00.123456"
    })
}

// =============================================================================
// HTTP
// =============================================================================

pub fn app(session: ScriptedSession) -> Router {
    build_router(
        &HttpServerConfig::default(),
        AppState::new(session, "/tmp/data/pglite_db"),
    )
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub fn with_body(method: &str, uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn post(uri: &str, body: Value) -> Request<Body> {
    with_body("POST", uri, &body.to_string())
}

pub fn put(uri: &str, body: Value) -> Request<Body> {
    with_body("PUT", uri, &body.to_string())
}

pub async fn send_raw(router: Router, request: Request<Body>) -> Response {
    router.oneshot(request).await.unwrap()
}

/// Send a request and decode the JSON body
pub async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = send_raw(router, request).await;
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

pub async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

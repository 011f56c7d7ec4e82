//! Embedded Engine Tests
//!
//! End-to-end checks against a real embedded PostgreSQL server. The first
//! run downloads the server binaries, so these are ignored by default:
//!
//! ```text
//! cargo test --test embedded_engine -- --ignored --test-threads=1
//! ```

mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::Router;
use pgbridge::dump;
use pgbridge::engine::{EmbeddedPostgres, EngineOptions, PgSession, Session, SqlParam};
use pgbridge::http_server::{build_router, AppState, HttpServerConfig};
use pgbridge::schema;
use pgbridge::storage::StoreLocation;
use serde_json::{json, Value};
use tempfile::TempDir;

use common::{get, post, put, send};

// =============================================================================
// Test Utilities
// =============================================================================

struct TestStore {
    _dir: TempDir,
    engine: EmbeddedPostgres,
}

impl TestStore {
    async fn open() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let location = StoreLocation::prepare(dir.path()).expect("store not writable");
        let engine = EmbeddedPostgres::open(&location, &EngineOptions::default())
            .await
            .expect("engine failed to start");
        schema::bootstrap(&engine.session())
            .await
            .expect("bootstrap failed");
        Self { _dir: dir, engine }
    }

    fn session(&self) -> PgSession {
        self.engine.session()
    }

    fn router(&self) -> Router {
        build_router(
            &HttpServerConfig::default(),
            AppState::new(self.session(), "/tmp"),
        )
    }

    async fn close(self) {
        self.engine.shutdown().await.expect("engine failed to stop");
    }
}

async fn count(session: &PgSession, sql: &str) -> i64 {
    let output = session.execute(sql, &[]).await.unwrap();
    output.first().unwrap()["count"].as_i64().unwrap()
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
#[ignore = "boots an embedded PostgreSQL server"]
async fn test_duplicate_email_is_rejected() {
    let store = TestStore::open().await;
    let user = json!({"name": "Ada", "email": "ada@example.com"});

    let (status, _) = send(store.router(), post("/users", user.clone())).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(store.router(), post("/users", user)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "23505");

    assert_eq!(count(&store.session(), "SELECT count(*) AS count FROM users").await, 1);
    store.close().await;
}

#[tokio::test]
#[ignore = "boots an embedded PostgreSQL server"]
async fn test_failed_transaction_leaves_no_trace() {
    let store = TestStore::open().await;

    let request = post(
        "/transaction",
        json!({"queries": [
            {"query": "INSERT INTO users (name, email) VALUES ($1, $2)", "params": ["A", "a@x.io"]},
            {"query": "INSERT INTO users (name, email) VALUES ($1, $2)", "params": ["B", "b@x.io"]},
            {"query": "INSERT INTO no_such_table VALUES (1)"}
        ]}),
    );
    let (status, body) = send(store.router(), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "42P01");

    assert_eq!(count(&store.session(), "SELECT count(*) AS count FROM users").await, 0);

    // The session is usable again after the rollback
    let (status, body) = send(store.router(), post("/query", json!({"query": "SELECT 1 AS one"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rows"][0]["one"], 1);
    store.close().await;
}

#[tokio::test]
#[ignore = "boots an embedded PostgreSQL server"]
async fn test_missing_user_and_empty_update() {
    let store = TestStore::open().await;

    let (status, body) = send(store.router(), get("/users/999")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.get("user").is_none());

    let (_, created) = send(
        store.router(),
        post("/users", json!({"name": "Ada", "email": "ada@example.com"})),
    )
    .await;
    let id = created["user"]["id"].as_i64().unwrap();

    let (status, _) = send(store.router(), put(&format!("/users/{}", id), json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(store.router(), get(&format!("/users/{}", id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["name"], "Ada");
    store.close().await;
}

#[tokio::test]
#[ignore = "boots an embedded PostgreSQL server"]
async fn test_export_import_round_trip() {
    let source = TestStore::open().await;
    let session = source.session();
    session
        .run(
            "CREATE TABLE notes (id integer NOT NULL, body text, score numeric(6,2));
             INSERT INTO notes VALUES (1, 'it''s fine', 1.50), (2, NULL, NULL);
             INSERT INTO users (name, email) VALUES ('Ada', 'ada@example.com');",
        )
        .await
        .unwrap();

    let exported = dump::export(&session).await.unwrap();
    assert_eq!(exported.tables, 2);
    assert_eq!(exported.rows, 3);
    source.close().await;

    let target = TestStore::open().await;
    let session = target.session();
    dump::import(&session, &exported.sql).await.unwrap();

    let notes = session
        .execute("SELECT id, body, score FROM notes ORDER BY id", &[])
        .await
        .unwrap();
    assert_eq!(notes.rows.len(), 2);
    assert_eq!(notes.rows[0]["body"], "it's fine");
    assert_eq!(notes.rows[0]["score"], "1.50");
    assert_eq!(notes.rows[1]["body"], Value::Null);

    let (_, users) = send(target.router(), get("/users")).await;
    assert_eq!(users["users"][0]["email"], "ada@example.com");

    // The users sequence was moved past the imported ids
    let (status, created) = send(
        target.router(),
        post("/users", json!({"name": "Grace", "email": "grace@example.com"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["user"]["id"], 2);
    target.close().await;
}

#[tokio::test]
#[ignore = "boots an embedded PostgreSQL server"]
async fn test_failed_script_does_not_abort_the_session() {
    let store = TestStore::open().await;

    let script = "BEGIN; CREATE TABLE imp_x (i int); SELECT 1/0; COMMIT;";
    let (status, body) = send(store.router(), post("/import", json!({"sql": script}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "22012");

    let (status, body) = send(store.router(), post("/query", json!({"query": "SELECT 1 AS one"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rows"][0]["one"], 1);

    let (_, health) = send(store.router(), get("/health")).await;
    assert_eq!(health["database"], "connected");

    // The script's own transaction was rolled back
    let (_, tables) = send(store.router(), get("/tables")).await;
    assert!(!tables["tables"].to_string().contains("imp_x"));
    store.close().await;
}

#[tokio::test]
#[ignore = "boots an embedded PostgreSQL server"]
async fn test_uncommon_column_types_decode() {
    let store = TestStore::open().await;
    let session = store.session();

    let output = session
        .execute(
            "SELECT interval '1 day' AS span, time with time zone '12:30:00+05:30' AS at,
                    '10.0.0.1'::inet AS host, '10.0.0.0/8'::cidr AS net,
                    ARRAY[1.5::numeric, NULL] AS nums, ARRAY[date '2024-05-01'] AS days",
            &[],
        )
        .await
        .unwrap();
    let row = output.first().unwrap();
    assert_eq!(row["span"], "1 day");
    assert_eq!(row["at"], "12:30:00+05:30");
    assert_eq!(row["host"], "10.0.0.1");
    assert_eq!(row["net"], "10.0.0.0/8");
    assert_eq!(row["nums"], json!(["1.5", null]));
    assert_eq!(row["days"], json!(["2024-05-01"]));

    // No native decoder: money and aclitem[] come back as text
    let output = session
        .execute("SELECT 12.5::money AS price, $1::int AS n", &[SqlParam::Int(7)])
        .await
        .unwrap();
    assert_eq!(output.rows[0]["n"], 7);
    assert!(output.rows[0]["price"].as_str().unwrap().contains("12.50"));
    assert_eq!(output.fields[0].data_type_id, 790);

    let output = session
        .execute("SELECT relname, relacl FROM pg_class LIMIT 5", &[])
        .await
        .unwrap();
    assert_eq!(output.rows.len(), 5);

    let output = session.execute("SELECT current_time AS now", &[]).await.unwrap();
    assert!(output.rows[0]["now"].is_string());
    store.close().await;
}

#[tokio::test]
#[ignore = "boots an embedded PostgreSQL server"]
async fn test_concurrent_increments_are_serialised() {
    let store = TestStore::open().await;
    let session = Arc::new(store.session());
    session
        .run("CREATE TABLE counter (n integer NOT NULL); INSERT INTO counter VALUES (0);")
        .await
        .unwrap();

    let tasks: Vec<_> = (0..50)
        .map(|_| {
            let session = session.clone();
            tokio::spawn(async move {
                session
                    .execute("UPDATE counter SET n = n + 1", &[])
                    .await
                    .unwrap();
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap();
    }

    let output = session.execute("SELECT n FROM counter", &[]).await.unwrap();
    assert_eq!(output.rows[0]["n"], 50);
    store.close().await;
}

#[tokio::test]
#[ignore = "boots an embedded PostgreSQL server"]
async fn test_store_reopens_with_data() {
    let dir = TempDir::new().unwrap();
    let options = EngineOptions::default();

    let location = StoreLocation::prepare(dir.path()).unwrap();
    let engine = EmbeddedPostgres::open(&location, &options).await.unwrap();
    schema::bootstrap(&engine.session()).await.unwrap();
    engine
        .session()
        .run("INSERT INTO users (name, email) VALUES ('Ada', 'ada@example.com')")
        .await
        .unwrap();
    engine.shutdown().await.unwrap();

    let location = StoreLocation::prepare(dir.path()).unwrap();
    let engine = EmbeddedPostgres::open(&location, &options).await.unwrap();
    schema::bootstrap(&engine.session()).await.unwrap();
    assert_eq!(count(&engine.session(), "SELECT count(*) AS count FROM users").await, 1);
    engine.shutdown().await.unwrap();
}

//! Observability HTTP Routes
//!
//! Liveness with a database round trip.

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use crate::engine::Session;
use crate::schema;

use super::state::SharedState;

/// Health check response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
    pub data_dir: String,
    pub timestamp: String,
}

impl HealthResponse {
    fn new(connected: bool, data_dir: String) -> Self {
        let (status, database) = if connected {
            ("healthy", "connected")
        } else {
            ("degraded", "disconnected")
        };
        Self {
            status,
            database,
            data_dir,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

/// Health check route at the root
pub fn health_routes<S: Session>(state: SharedState<S>) -> Router {
    Router::new()
        .route("/health", get(health_handler::<S>))
        .with_state(state)
}

/// Always 200; a failed round trip is reported in the body
async fn health_handler<S: Session>(State(state): State<SharedState<S>>) -> impl IntoResponse {
    let connected = schema::ping(&state.session).await;
    let response = HealthResponse::new(connected, state.data_dir.display().to_string());
    (StatusCode::OK, Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_response_serialization() {
        let response = HealthResponse::new(true, "/app/data/pglite_db".to_string());
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["database"], "connected");
        assert_eq!(json["dataDir"], "/app/data/pglite_db");
        assert!(json["timestamp"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn test_degraded_when_disconnected() {
        let response = HealthResponse::new(false, String::new());
        assert_eq!(response.status, "degraded");
        assert_eq!(response.database, "disconnected");
    }
}

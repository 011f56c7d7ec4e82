//! # HTTP Server Module
//!
//! JSON over HTTP in front of the engine session. Every handler follows
//! the same pipeline: validate the body, execute through the session,
//! wrap the outcome in the `{success, ...}` envelope.
//!
//! # Endpoints
//!
//! - `/health` - Liveness with a database round trip
//! - `/query`, `/transaction` - Raw SQL
//! - `/tables`, `/tables/:name/schema`, `/stats` - Introspection
//! - `/export`, `/import` - SQL dump transfer
//! - `/users`, `/users/:id` - CRUD over the bootstrapped table
//!
//! No route is authenticated.

pub mod config;
pub mod database_routes;
pub mod errors;
pub mod observability_routes;
pub mod request;
pub mod server;
pub mod state;
pub mod user_routes;

pub use config::HttpServerConfig;
pub use errors::{ApiError, ApiResult};
pub use server::{build_router, HttpServer};
pub use state::{AppState, SharedState};

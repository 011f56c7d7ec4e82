//! pgbridge - HTTP/JSON access to an embedded PostgreSQL store
//!
//! A single process owns an embedded engine whose data lives in a local
//! directory, and exposes raw SQL, atomic batches, catalog introspection,
//! SQL dump transfer and a `users` CRUD resource over HTTP.

pub mod cli;
pub mod config;
pub mod dump;
pub mod engine;
pub mod http_server;
pub mod schema;
pub mod storage;
pub mod users;

//! # Schema
//!
//! Startup bootstrap of the `users` table and read-only catalog
//! introspection (table list, column metadata, sizes).
//!
//! Catalog statements are assumed well-formed; their failures are server
//! errors at the HTTP boundary.

mod bootstrap;
mod catalog;

pub use bootstrap::{bootstrap, USERS_TABLE_DDL};
pub use catalog::{database_stats, list_tables, ping, table_columns, DatabaseStats, DEFAULT_SCHEMA};

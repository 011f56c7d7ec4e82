//! # Embedded Engine
//!
//! The single database session shared by every request.
//!
//! The engine is an embedded PostgreSQL server owned by this process and
//! started against the store directory. All SQL flows through one client
//! connection guarded by an async mutex, so statements never run in
//! parallel and a transaction holds the session until it ends.
//!
//! Handlers depend on the [`Session`] trait rather than on the concrete
//! connection so tests can inject scripted sessions.

mod batch;
mod embedded;
mod errors;
mod postgres;
mod session;
mod value;

pub use batch::{run_transaction, Statement};
pub use embedded::{EmbeddedPostgres, EngineOptions};
pub use errors::{EngineError, EngineResult, QueryError, QueryResult};
pub use postgres::{PgSession, PgTransaction};
pub use session::{Field, QueryOutput, Row, Session, Transaction};
pub use value::SqlParam;

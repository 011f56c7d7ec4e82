//! Idempotent creation of the example table

use tracing::info;

use crate::engine::{QueryResult, Session};

/// DDL for the example entity
pub const USERS_TABLE_DDL: &str = "CREATE TABLE IF NOT EXISTS users (
    id SERIAL PRIMARY KEY,
    name TEXT NOT NULL,
    email TEXT UNIQUE NOT NULL,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
)";

/// Ensure the `users` table exists. Safe against a store that already has it.
pub async fn bootstrap<S: Session>(session: &S) -> QueryResult<()> {
    session.run(USERS_TABLE_DDL).await?;
    info!("schema bootstrap complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ddl_is_conditional() {
        assert!(USERS_TABLE_DDL.starts_with("CREATE TABLE IF NOT EXISTS users"));
        assert!(USERS_TABLE_DDL.contains("email TEXT UNIQUE NOT NULL"));
    }
}

//! Raw script replay

use tracing::info;

use crate::engine::Session;

use super::errors::{DumpError, DumpResult};

/// Execute `sql` as a single multi-statement batch.
///
/// Statements before a failing one stay applied unless the script wraps
/// itself in `BEGIN`/`COMMIT`.
pub async fn import<S: Session>(session: &S, sql: &str) -> DumpResult<()> {
    session.run(sql).await.map_err(DumpError::Import)?;
    info!(bytes = sql.len(), "import complete");
    Ok(())
}

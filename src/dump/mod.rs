//! # SQL Dump
//!
//! Export renders every table of the default schema as a textual SQL
//! script: one `CREATE TABLE` per table rebuilt from the catalog, then one
//! `INSERT` per row. Literal quoting is done by the engine itself
//! (`quote_ident`, `quote_nullable`), so NULL becomes `NULL` and every
//! other value is an escaped literal of its textual form.
//!
//! The reconstruction keeps column names, types and NOT NULL only.
//! Indexes, defaults, other constraints and foreign keys are not exported.
//! Serial and identity sequences are moved past the imported rows when the
//! target already has them, so later inserts do not reuse imported ids.
//!
//! Import replays a script as one multi-statement batch with no
//! transaction of its own. A failed script is followed by a `ROLLBACK`,
//! so a `BEGIN` inside the script does not leave the session aborted.

mod errors;
mod export;
mod import;

pub use errors::{DumpError, DumpResult};
pub use export::{export, ColumnDef, Dump};
pub use import::import;

//! Shared handler state

use std::path::PathBuf;
use std::sync::Arc;

use crate::engine::Session;

/// Process-wide state handed to every handler
pub struct AppState<S: Session> {
    pub session: S,
    /// Store directory reported by `/health`
    pub data_dir: PathBuf,
}

impl<S: Session> AppState<S> {
    pub fn new(session: S, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            session,
            data_dir: data_dir.into(),
        }
    }
}

/// State as extracted by handlers
pub type SharedState<S> = Arc<AppState<S>>;

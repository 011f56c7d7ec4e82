//! Embedded PostgreSQL server lifecycle
//!
//! The server binaries are installed on first use, the store directory is
//! initialised when empty, and the server runs as a child process for the
//! lifetime of this process.

use std::collections::HashMap;

use postgresql_embedded::{PostgreSQL, Settings};
use tokio_postgres::NoTls;
use tracing::{error, info};

use crate::storage::StoreLocation;

use super::errors::{EngineError, EngineResult};
use super::postgres::PgSession;

/// Engine options taken from configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
    /// Application database name
    pub database: String,
    /// Superuser password, fixed so a store can be reopened
    pub password: String,
    /// Trade fsync on commit for lower write latency
    pub relaxed_durability: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            database: "app".to_string(),
            password: "postgres".to_string(),
            relaxed_durability: true,
        }
    }
}

impl EngineOptions {
    /// Server configuration overrides passed at start
    pub fn server_configuration(&self) -> HashMap<String, String> {
        let mut configuration = HashMap::new();
        if self.relaxed_durability {
            configuration.insert("synchronous_commit".to_string(), "off".to_string());
        }
        configuration
    }
}

/// A running embedded engine and its single session
pub struct EmbeddedPostgres {
    server: PostgreSQL,
    session: PgSession,
}

impl EmbeddedPostgres {
    /// Start the engine against the store directory and connect the session.
    pub async fn open(location: &StoreLocation, options: &EngineOptions) -> EngineResult<Self> {
        let mut settings = Settings::default();
        settings.data_dir = location.path().to_path_buf();
        settings.password = options.password.clone();
        settings.temporary = false;
        settings.configuration = options.server_configuration();

        let mut server = PostgreSQL::new(settings);
        server.setup().await.map_err(EngineError::Setup)?;
        server.start().await.map_err(EngineError::Start)?;
        info!(
            data_dir = %location.path().display(),
            port = server.settings().port,
            relaxed_durability = options.relaxed_durability,
            "engine started"
        );

        let exists = server
            .database_exists(&options.database)
            .await
            .map_err(EngineError::Provision)?;
        if !exists {
            server
                .create_database(&options.database)
                .await
                .map_err(EngineError::Provision)?;
            info!(database = %options.database, "database created");
        }

        let url = server.settings().url(&options.database);
        let (client, connection) = tokio_postgres::connect(&url, NoTls)
            .await
            .map_err(EngineError::Connect)?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!(error = %e, "engine connection closed");
            }
        });

        Ok(Self {
            server,
            session: PgSession::new(client),
        })
    }

    /// The shared session
    pub fn session(&self) -> PgSession {
        self.session.clone()
    }

    /// Stop the server process.
    pub async fn shutdown(self) -> EngineResult<()> {
        let Self { server, session } = self;
        drop(session);
        server.stop().await.map_err(EngineError::Stop)?;
        info!("engine stopped");
        Ok(())
    }
}

//! Process configuration loaded from environment variables.
//!
//! | Variable             | Default     | Description                              |
//! |----------------------|-------------|------------------------------------------|
//! | `HOST`               | `0.0.0.0`   | HTTP bind address                        |
//! | `PORT`               | `3000`      | HTTP listen port                         |
//! | `DATA_DIR`           | `/app/data` | Parent of the `pglite_db` store          |
//! | `LOG_LEVEL`          | `info`      | tracing filter (falls back to `RUST_LOG`) |
//! | `CORS_ORIGINS`       | (empty)     | Comma-separated origins; empty allows any |
//! | `RELAXED_DURABILITY` | `true`      | Skip fsync on commit                     |
//! | `PG_DATABASE`        | `app`       | Application database name                |
//! | `PG_PASSWORD`        | `postgres`  | Engine superuser password                |

use std::path::PathBuf;

use crate::engine::EngineOptions;
use crate::http_server::HttpServerConfig;

/// Runtime configuration for the server process.
#[derive(Debug, Clone)]
pub struct Config {
    pub server: HttpServerConfig,
    pub data_dir: PathBuf,
    pub log_level: String,
    pub engine: EngineOptions,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`, applying defaults where a
    /// variable is absent or unparseable.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let env = Env(lookup);
        let server_defaults = HttpServerConfig::default();
        let engine_defaults = EngineOptions::default();

        Self {
            server: HttpServerConfig {
                host: env.string("HOST", &server_defaults.host),
                port: env.parse("PORT", server_defaults.port),
                cors_origins: env.list("CORS_ORIGINS"),
            },
            data_dir: PathBuf::from(env.string("DATA_DIR", "/app/data")),
            log_level: env
                .get("LOG_LEVEL")
                .or_else(|| env.get("RUST_LOG"))
                .unwrap_or_else(|| "info".to_string()),
            engine: EngineOptions {
                database: env.string("PG_DATABASE", &engine_defaults.database),
                password: env.string("PG_PASSWORD", &engine_defaults.password),
                relaxed_durability: env
                    .bool("RELAXED_DURABILITY")
                    .unwrap_or(engine_defaults.relaxed_durability),
            },
        }
    }
}

struct Env<F>(F);

impl<F: Fn(&str) -> Option<String>> Env<F> {
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    fn string(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    fn parse<T: std::str::FromStr>(&self, key: &str, default: T) -> T {
        self.get(key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    fn bool(&self, key: &str) -> Option<bool> {
        match self.get(key)?.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        }
    }

    fn list(&self, key: &str) -> Vec<String> {
        self.get(key)
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let cfg = config(&[]);
        assert_eq!(cfg.server.port, 3000);
        assert_eq!(cfg.server.host, "0.0.0.0");
        assert!(cfg.server.cors_origins.is_empty());
        assert_eq!(cfg.data_dir, PathBuf::from("/app/data"));
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.engine, EngineOptions::default());
    }

    #[test]
    fn test_overrides_applied() {
        let cfg = config(&[
            ("PORT", "8080"),
            ("DATA_DIR", "/tmp/store"),
            ("CORS_ORIGINS", "http://a.test, http://b.test,"),
            ("RELAXED_DURABILITY", "false"),
            ("PG_DATABASE", "bench"),
        ]);
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.data_dir, PathBuf::from("/tmp/store"));
        assert_eq!(cfg.server.cors_origins, vec!["http://a.test", "http://b.test"]);
        assert!(!cfg.engine.relaxed_durability);
        assert_eq!(cfg.engine.database, "bench");
    }

    #[test]
    fn test_unparseable_values_fall_back() {
        let cfg = config(&[("PORT", "eighty"), ("RELAXED_DURABILITY", "maybe")]);
        assert_eq!(cfg.server.port, 3000);
        assert!(cfg.engine.relaxed_durability);
    }

    #[test]
    fn test_log_level_falls_back_to_rust_log() {
        assert_eq!(config(&[("RUST_LOG", "debug")]).log_level, "debug");
        assert_eq!(
            config(&[("RUST_LOG", "debug"), ("LOG_LEVEL", "warn")]).log_level,
            "warn"
        );
    }
}

//! Configuration loading and representation.
//!
//! All settings come from environment variables. `from_lookup` takes any
//! key → value function so tests never touch the process environment.

use std::net::SocketAddr;

use thiserror::Error;

pub use stockrecon_observability::LogFormat;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set when USE_PERSISTENT_STORES=true")]
    Missing(&'static str),

    #[error("invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Where the engine's stores live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    /// Process-local stores (tests/dev). Empty on startup.
    InMemory,
    Postgres {
        database_url: String,
        max_connections: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub backend: StoreBackend,
    /// Run one reconcile pass before serving.
    pub reconcile_on_start: bool,
    pub log_format: LogFormat,
}

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

impl AppConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_addr = {
            let raw = lookup("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
            raw.parse::<SocketAddr>().map_err(|e| ConfigError::Invalid {
                key: "BIND_ADDR",
                value: raw.clone(),
                reason: e.to_string(),
            })?
        };

        let use_persistent = parse_flag(&lookup, "USE_PERSISTENT_STORES")?;
        let backend = if use_persistent {
            let database_url = lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
            let max_connections = match lookup("DATABASE_MAX_CONNECTIONS") {
                Some(raw) => raw.parse::<u32>().map_err(|e| ConfigError::Invalid {
                    key: "DATABASE_MAX_CONNECTIONS",
                    value: raw.clone(),
                    reason: e.to_string(),
                })?,
                None => DEFAULT_MAX_CONNECTIONS,
            };
            StoreBackend::Postgres {
                database_url,
                max_connections,
            }
        } else {
            StoreBackend::InMemory
        };

        let log_format = match lookup("LOG_FORMAT").as_deref() {
            None | Some("json") => LogFormat::Json,
            Some("pretty") => LogFormat::Pretty,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "LOG_FORMAT",
                    value: other.to_string(),
                    reason: "expected `json` or `pretty`".to_string(),
                });
            }
        };

        Ok(Self {
            bind_addr,
            backend,
            reconcile_on_start: parse_flag(&lookup, "RECONCILE_ON_START")?,
            log_format,
        })
    }
}

fn parse_flag(lookup: &impl Fn(&str) -> Option<String>, key: &'static str) -> Result<bool, ConfigError> {
    match lookup(key) {
        None => Ok(false),
        Some(raw) => match raw.to_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" | "" => Ok(false),
            _ => Err(ConfigError::Invalid {
                key,
                value: raw,
                reason: "expected a boolean".to_string(),
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_to_in_memory_json() {
        let config = load(&[]).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:8080".parse().unwrap());
        assert_eq!(config.backend, StoreBackend::InMemory);
        assert!(!config.reconcile_on_start);
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn persistent_stores_require_database_url() {
        let err = load(&[("USE_PERSISTENT_STORES", "true")]).unwrap_err();
        assert_eq!(err, ConfigError::Missing("DATABASE_URL"));
    }

    #[test]
    fn reads_postgres_settings() {
        let config = load(&[
            ("USE_PERSISTENT_STORES", "true"),
            ("DATABASE_URL", "postgres://localhost/stock"),
            ("DATABASE_MAX_CONNECTIONS", "12"),
            ("RECONCILE_ON_START", "yes"),
            ("LOG_FORMAT", "pretty"),
        ])
        .unwrap();

        assert_eq!(
            config.backend,
            StoreBackend::Postgres {
                database_url: "postgres://localhost/stock".to_string(),
                max_connections: 12,
            }
        );
        assert!(config.reconcile_on_start);
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn rejects_garbage_flags() {
        let err = load(&[("RECONCILE_ON_START", "sometimes")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "RECONCILE_ON_START", .. }));
    }

    #[test]
    fn rejects_bad_bind_addr() {
        let err = load(&[("BIND_ADDR", "nowhere")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "BIND_ADDR", .. }));
    }
}

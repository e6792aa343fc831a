//! Process configuration, read once from the environment at startup.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_LISTEN: &str = "0.0.0.0:8082";
pub const DEFAULT_SQLITE_PATH: &str = "social.db";
pub const DEFAULT_STORE_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_SEARCH_LIMIT: usize = 100;

/// Which graph store backs the repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Sqlite,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub listen: SocketAddr,
    pub store: StoreBackend,
    pub sqlite_path: PathBuf,
    pub store_timeout: Duration,
    pub search_limit: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid {var}={value:?}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

impl Config {
    /// Read `SOCIAL_LISTEN`, `SOCIAL_STORE`, `SOCIAL_SQLITE_PATH`, `SOCIAL_STORE_TIMEOUT_MS`,
    /// `SOCIAL_SEARCH_LIMIT`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &'static str, default: &str| -> (String, &'static str) {
            (lookup(var).unwrap_or_else(|| default.to_string()), var)
        };
        let invalid = |(value, var): (String, &'static str), reason: String| ConfigError::Invalid {
            var,
            value,
            reason,
        };

        let listen = get("SOCIAL_LISTEN", DEFAULT_LISTEN);
        let listen: SocketAddr = listen
            .0
            .parse()
            .map_err(|e: std::net::AddrParseError| invalid(listen.clone(), e.to_string()))?;

        let store = get("SOCIAL_STORE", "memory");
        let backend = store.0.trim().to_ascii_lowercase();
        let store = match backend.as_str() {
            "memory" | "in-memory" => StoreBackend::Memory,
            "sqlite" => StoreBackend::Sqlite,
            _ => return Err(invalid(store, "expected memory or sqlite".to_string())),
        };

        let sqlite_path = PathBuf::from(get("SOCIAL_SQLITE_PATH", DEFAULT_SQLITE_PATH).0);

        let timeout = get("SOCIAL_STORE_TIMEOUT_MS", &DEFAULT_STORE_TIMEOUT_MS.to_string());
        let timeout_ms: u64 = match timeout.0.parse() {
            Ok(ms) if ms > 0 => ms,
            Ok(_) => return Err(invalid(timeout, "must be positive".to_string())),
            Err(e) => return Err(invalid(timeout, format!("{}", e))),
        };

        let limit = get("SOCIAL_SEARCH_LIMIT", &DEFAULT_SEARCH_LIMIT.to_string());
        let search_limit: usize = match limit.0.parse() {
            Ok(n) if n > 0 => n,
            Ok(_) => return Err(invalid(limit, "must be positive".to_string())),
            Err(e) => return Err(invalid(limit, format!("{}", e))),
        };

        Ok(Self {
            listen,
            store,
            sqlite_path,
            store_timeout: Duration::from_millis(timeout_ms),
            search_limit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k: &str| map.get(k).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg.listen.port(), 8082);
        assert_eq!(cfg.store, StoreBackend::Memory);
        assert_eq!(cfg.store_timeout, Duration::from_millis(DEFAULT_STORE_TIMEOUT_MS));
        assert_eq!(cfg.search_limit, DEFAULT_SEARCH_LIMIT);
    }

    #[test]
    fn overrides_are_parsed() {
        let cfg = Config::from_lookup(lookup(&[
            ("SOCIAL_LISTEN", "127.0.0.1:9000"),
            ("SOCIAL_STORE", "SQLite"),
            ("SOCIAL_SQLITE_PATH", "/tmp/graph.db"),
            ("SOCIAL_STORE_TIMEOUT_MS", "250"),
            ("SOCIAL_SEARCH_LIMIT", "7"),
        ]))
        .unwrap();
        assert_eq!(cfg.listen.to_string(), "127.0.0.1:9000");
        assert_eq!(cfg.store, StoreBackend::Sqlite);
        assert_eq!(cfg.sqlite_path, PathBuf::from("/tmp/graph.db"));
        assert_eq!(cfg.store_timeout, Duration::from_millis(250));
        assert_eq!(cfg.search_limit, 7);
    }

    #[test]
    fn bad_values_name_the_variable() {
        for (var, value) in [
            ("SOCIAL_LISTEN", "nowhere"),
            ("SOCIAL_STORE", "neo4j"),
            ("SOCIAL_STORE_TIMEOUT_MS", "0"),
            ("SOCIAL_SEARCH_LIMIT", "lots"),
        ] {
            let err = Config::from_lookup(lookup(&[(var, value)])).unwrap_err();
            assert!(err.to_string().contains(var), "{}", err);
        }
    }
}

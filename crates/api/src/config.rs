use std::fmt;
use std::str::FromStr;

use bomtree_core::path::SiblingIndexing;

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{other}' (expected pretty or json)")),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pretty => f.write_str("pretty"),
            Self::Json => f.write_str("json"),
        }
    }
}

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development. `DATABASE_URL`
/// is read separately by the binary since tests never need it.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Connection pool size (default: `20`).
    pub database_max_connections: u32,
    /// How sibling indices are allocated (default: `sequence`).
    pub sibling_indexing: SiblingIndexing,
    /// Actor recorded in `createdBy`/`updatedBy` (default: `admin`).
    pub audit_actor: String,
    pub log_format: LogFormat,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                    | Default                 |
    /// |----------------------------|-------------------------|
    /// | `HOST`                     | `0.0.0.0`               |
    /// | `PORT`                     | `3000`                  |
    /// | `CORS_ORIGINS`             | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`     | `30`                    |
    /// | `DATABASE_MAX_CONNECTIONS` | `20`                    |
    /// | `BOM_SIBLING_INDEXING`     | `sequence`              |
    /// | `BOM_AUDIT_ACTOR`          | `admin`                 |
    /// | `LOG_FORMAT`               | `pretty`                |
    ///
    /// Panics on malformed values so misconfiguration fails at startup.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let host = var("HOST", "0.0.0.0");

        let port: u16 = var("PORT", "3000")
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = var("CORS_ORIGINS", "http://localhost:5173")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = var("REQUEST_TIMEOUT_SECS", "30")
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let database_max_connections: u32 = var("DATABASE_MAX_CONNECTIONS", "20")
            .parse()
            .expect("DATABASE_MAX_CONNECTIONS must be a valid u32");

        let sibling_indexing: SiblingIndexing = var("BOM_SIBLING_INDEXING", "sequence")
            .parse()
            .unwrap_or_else(|e| panic!("BOM_SIBLING_INDEXING is invalid: {e}"));

        let audit_actor = var("BOM_AUDIT_ACTOR", "admin");

        let log_format: LogFormat = var("LOG_FORMAT", "pretty")
            .parse()
            .unwrap_or_else(|e| panic!("LOG_FORMAT is invalid: {e}"));

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            database_max_connections,
            sibling_indexing,
            audit_actor,
            log_format,
        }
    }
}

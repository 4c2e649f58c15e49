//! Configuration module
//!
//! Loads configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use sqlx::postgres::PgConnectOptions;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection options
    pub database: PgConnectOptions,

    /// Maximum database connections in pool
    pub database_max_connections: u32,

    /// How long a request waits for a pooled connection
    pub database_acquire_timeout: Duration,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Apply embedded migrations at startup
    pub run_migrations: bool,

    pub log_format: LogFormat,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database = match lookup("DATABASE_URL") {
            Some(url) => url
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DATABASE_URL"))?,
            None => database_from_parts(&lookup)?,
        };

        let database_max_connections = parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?;
        let acquire_secs: u64 = parse_or(&lookup, "DATABASE_ACQUIRE_TIMEOUT_SECS", 5)?;

        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string());

        let port = match lookup("APP_PORT") {
            Some(raw) => raw
                .parse()
                .map_err(|_| ConfigError::InvalidValue("APP_PORT"))?,
            None => parse_or(&lookup, "PORT", 8080)?,
        };

        let run_migrations = match lookup("RUN_MIGRATIONS") {
            None => true,
            Some(raw) => parse_bool(&raw).ok_or(ConfigError::InvalidValue("RUN_MIGRATIONS"))?,
        };

        let log_format = match lookup("LOG_FORMAT").as_deref() {
            None | Some("pretty") => LogFormat::Pretty,
            Some("json") => LogFormat::Json,
            Some(_) => return Err(ConfigError::InvalidValue("LOG_FORMAT")),
        };

        Ok(Self {
            database,
            database_max_connections,
            database_acquire_timeout: Duration::from_secs(acquire_secs),
            host,
            port,
            run_migrations,
            log_format,
        })
    }

    /// Address to bind the HTTP listener to
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Build connection options from the `DB_*` variables.
/// Each part is passed through as-is, so reserved URL characters are safe.
fn database_from_parts(
    lookup: &impl Fn(&str) -> Option<String>,
) -> Result<PgConnectOptions, ConfigError> {
    let user = lookup("DB_USER").ok_or(ConfigError::MissingEnv("DATABASE_URL or DB_USER"))?;
    let name = lookup("DB_NAME").ok_or(ConfigError::MissingEnv("DATABASE_URL or DB_NAME"))?;
    let host = lookup("DB_HOST").unwrap_or_else(|| "localhost".to_string());
    let port: u16 = parse_or(lookup, "DB_PORT", 5432)?;

    let options = PgConnectOptions::new()
        .host(&host)
        .port(port)
        .username(&user)
        .database(&name);

    Ok(match lookup("DB_PASSWORD") {
        Some(password) if !password.is_empty() => options.password(&password),
        _ => options,
    })
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue(key)),
        None => Ok(default),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnv(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config =
            Config::from_lookup(lookup_from(&[("DATABASE_URL", "postgres://localhost/w")]))
                .unwrap();

        assert_eq!(config.database.get_host(), "localhost");
        assert_eq!(config.database.get_database(), Some("w"));
        assert_eq!(config.database_max_connections, 10);
        assert_eq!(config.database_acquire_timeout, Duration::from_secs(5));
        assert_eq!(config.bind_addr(), "0.0.0.0:8080");
        assert!(config.run_migrations);
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn test_database_url_from_parts() {
        let config = Config::from_lookup(lookup_from(&[
            ("DB_USER", "wallet"),
            ("DB_PASSWORD", "secret"),
            ("DB_NAME", "wallets"),
            ("DB_HOST", "db"),
        ]))
        .unwrap();

        assert_eq!(config.database.get_host(), "db");
        assert_eq!(config.database.get_port(), 5432);
        assert_eq!(config.database.get_username(), "wallet");
        assert_eq!(config.database.get_database(), Some("wallets"));
    }

    #[test]
    fn test_database_parts_with_reserved_characters() {
        let config = Config::from_lookup(lookup_from(&[
            ("DB_USER", "wallet"),
            ("DB_PASSWORD", "p@ss/w#rd:1"),
            ("DB_NAME", "wallets"),
            ("DB_HOST", "db"),
            ("DB_PORT", "6543"),
        ]))
        .unwrap();

        assert_eq!(config.database.get_host(), "db");
        assert_eq!(config.database.get_port(), 6543);
        assert_eq!(config.database.get_username(), "wallet");
        assert_eq!(config.database.get_database(), Some("wallets"));
    }

    #[test]
    fn test_malformed_database_url() {
        let err = Config::from_lookup(lookup_from(&[(
            "DATABASE_URL",
            "postgres://u@h:notaport/db",
        )]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue("DATABASE_URL")));
    }

    #[test]
    fn test_database_url_without_password() {
        let config =
            Config::from_lookup(lookup_from(&[("DB_USER", "wallet"), ("DB_NAME", "wallets")]))
                .unwrap();

        assert_eq!(config.database.get_host(), "localhost");
        assert_eq!(config.database.get_port(), 5432);
        assert_eq!(config.database.get_database(), Some("wallets"));
    }

    #[test]
    fn test_missing_database_settings() {
        let err = Config::from_lookup(lookup_from(&[("DB_NAME", "wallets")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnv(_)));
    }

    #[test]
    fn test_app_port_takes_precedence() {
        let config = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/w"),
            ("APP_PORT", "9000"),
            ("PORT", "7000"),
        ]))
        .unwrap();
        assert_eq!(config.port, 9000);

        let config = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/w"),
            ("PORT", "7000"),
        ]))
        .unwrap();
        assert_eq!(config.port, 7000);
    }

    #[test]
    fn test_invalid_values() {
        let base = ("DATABASE_URL", "postgres://localhost/w");

        for (key, value) in [
            ("APP_PORT", "not-a-port"),
            ("DATABASE_MAX_CONNECTIONS", "-1"),
            ("RUN_MIGRATIONS", "maybe"),
            ("LOG_FORMAT", "xml"),
        ] {
            let err = Config::from_lookup(lookup_from(&[base, (key, value)])).unwrap_err();
            assert!(
                matches!(err, ConfigError::InvalidValue(k) if k == key),
                "expected InvalidValue for {}",
                key
            );
        }
    }

    #[test]
    fn test_flags() {
        let config = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/w"),
            ("RUN_MIGRATIONS", "false"),
            ("LOG_FORMAT", "json"),
        ]))
        .unwrap();

        assert!(!config.run_migrations);
        assert_eq!(config.log_format, LogFormat::Json);
    }
}

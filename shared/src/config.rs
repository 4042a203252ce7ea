use anyhow::{Context, Result};
use dotenv::dotenv;
use sqlx::postgres::PgConnectOptions;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_SYMBOLS_URL: &str = "https://en.wikipedia.org/wiki/List_of_S%26P_500_companies";
pub const DEFAULT_PROVIDER_BASE_URL: &str = "https://query2.finance.yahoo.com";

/// PostgreSQL connection parameters (`DB_*` variables).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub name: String,
    pub user: String,
    pub password: Option<String>,
    pub host: String,
    pub port: u16,
}

impl DatabaseConfig {
    pub fn connect_options(&self) -> PgConnectOptions {
        let options = PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .database(&self.name);

        match &self.password {
            Some(password) => options.password(password),
            None => options,
        }
    }
}

pub struct Config {
    pub database: DatabaseConfig,
    pub ddl_path: PathBuf,
    pub symbols_url: String,
    pub provider_base_url: String,
    pub provider_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenv().ok();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let port = match var("DB_PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .with_context(|| format!("DB_PORT must be a port number, got {:?}", raw))?,
            None => 5432,
        };

        let timeout_secs = match var("PROVIDER_TIMEOUT_SECS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .with_context(|| format!("PROVIDER_TIMEOUT_SECS must be whole seconds, got {:?}", raw))?,
            None => 30,
        };

        Ok(Config {
            database: DatabaseConfig {
                name: var("DB_NAME").context("DB_NAME is not set")?,
                user: var("DB_USER").context("DB_USER is not set")?,
                password: var("DB_PASSWORD"),
                host: var("DB_HOST").unwrap_or_else(|| "localhost".to_string()),
                port,
            },
            ddl_path: var("DDL_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("schema/ddl.sql")),
            symbols_url: var("SYMBOLS_URL").unwrap_or_else(|| DEFAULT_SYMBOLS_URL.to_string()),
            provider_base_url: var("PROVIDER_BASE_URL")
                .unwrap_or_else(|| DEFAULT_PROVIDER_BASE_URL.to_string()),
            provider_timeout: Duration::from_secs(timeout_secs),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[("DB_NAME", "market"), ("DB_USER", "ingest")])).unwrap();

        assert_eq!(config.database.name, "market");
        assert_eq!(config.database.user, "ingest");
        assert_eq!(config.database.password, None);
        assert_eq!(config.database.host, "localhost");
        assert_eq!(config.database.port, 5432);
        assert_eq!(config.ddl_path, PathBuf::from("schema/ddl.sql"));
        assert_eq!(config.symbols_url, DEFAULT_SYMBOLS_URL);
        assert_eq!(config.provider_base_url, DEFAULT_PROVIDER_BASE_URL);
        assert_eq!(config.provider_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_all_database_vars() {
        let config = Config::from_lookup(lookup(&[
            ("DB_NAME", "market"),
            ("DB_USER", "ingest"),
            ("DB_PASSWORD", "secret"),
            ("DB_HOST", "db.internal"),
            ("DB_PORT", "6543"),
            ("PROVIDER_TIMEOUT_SECS", "5"),
        ]))
        .unwrap();

        assert_eq!(
            config.database,
            DatabaseConfig {
                name: "market".to_string(),
                user: "ingest".to_string(),
                password: Some("secret".to_string()),
                host: "db.internal".to_string(),
                port: 6543,
            }
        );
        assert_eq!(config.provider_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_missing_required() {
        let err = Config::from_lookup(lookup(&[("DB_USER", "ingest")])).err().unwrap();
        assert!(err.to_string().contains("DB_NAME"));

        let err = Config::from_lookup(lookup(&[("DB_NAME", "market"), ("DB_USER", "  ")]))
            .err()
            .unwrap();
        assert!(err.to_string().contains("DB_USER"));
    }

    #[test]
    fn test_bad_port() {
        let result = Config::from_lookup(lookup(&[
            ("DB_NAME", "market"),
            ("DB_USER", "ingest"),
            ("DB_PORT", "postgres"),
        ]));
        assert!(result.is_err());
    }
}

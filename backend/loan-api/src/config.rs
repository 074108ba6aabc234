//! Application configuration loaded from environment variables.

use crate::errors::{LoanError, Result};

#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite database URL or file path (created if missing)
    pub database_url: String,
    /// Port for the REST API server
    pub api_port: u16,
    /// Size of the SQLite connection pool
    pub max_connections: u32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Config {
            database_url: env_var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:./loans.db".to_string()),
            api_port: env_var("API_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .map_err(|_| LoanError::Config("Invalid API_PORT".to_string()))?,
            max_connections: parse_max_connections(
                &env_var("DB_MAX_CONNECTIONS").unwrap_or_else(|_| "5".to_string()),
            )?,
        })
    }
}

fn parse_max_connections(raw: &str) -> Result<u32> {
    match raw.parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(LoanError::Config(format!(
            "Invalid DB_MAX_CONNECTIONS '{raw}' (expected a positive integer)"
        ))),
    }
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| LoanError::Config(format!("Missing env var: {key}")))
}

use std::env;
use std::net::SocketAddr;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} has an invalid value: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub max_connections: u32,
}

impl AppConfig {
    /// Reads `DATABASE_URL`, `BIND_ADDR` and `DATABASE_MAX_CONNECTIONS`,
    /// loading a `.env` file first when one exists.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://openacademy.db".to_string());

        let bind_addr = parse_var("BIND_ADDR", "127.0.0.1:3000")?;
        let max_connections = parse_var("DATABASE_MAX_CONNECTIONS", "5")?;

        Ok(Self {
            database_url,
            bind_addr,
            max_connections,
        })
    }
}

fn parse_var<T: std::str::FromStr>(key: &'static str, default: &str) -> Result<T, ConfigError> {
    let value = env::var(key).unwrap_or_else(|_| default.to_string());
    match value.parse() {
        Ok(parsed) => Ok(parsed),
        Err(_) => Err(ConfigError::Invalid { key, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_var_falls_back_to_default() {
        let port: u32 = parse_var("OPENACADEMY_TEST_UNSET_VAR", "42").unwrap();
        assert_eq!(port, 42);
    }

    #[test]
    fn test_parse_var_reports_key_on_invalid_value() {
        let err = parse_var::<u32>("OPENACADEMY_TEST_UNSET_VAR_2", "not-a-number").unwrap_err();
        match err {
            ConfigError::Invalid { key, value } => {
                assert_eq!(key, "OPENACADEMY_TEST_UNSET_VAR_2");
                assert_eq!(value, "not-a-number");
            }
        }
    }
}

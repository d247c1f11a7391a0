use std::{env, net::IpAddr};

use tracing::warn;

const DEFAULT_DATABASE_URL: &str = "sqlite://todo.db";
const DEV_SECRET_KEY: &str = "dev-secret-key-change-me";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} must be {expected}, got {value:?}")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Runtime settings read from the environment (and `.env`, when the binary loads it).
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub secret_key: String,
    pub token_expire_minutes: i64,
    pub host: IpAddr,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());

        let secret_key = match env::var("SECRET_KEY") {
            Ok(key) if !key.is_empty() => key,
            _ => {
                warn!("SECRET_KEY is not set, falling back to an insecure development key");
                DEV_SECRET_KEY.to_string()
            }
        };

        let token_expire_minutes = parse_var("ACCESS_TOKEN_EXPIRE_MINUTES", 30i64, "a positive integer")?;
        if token_expire_minutes <= 0 {
            return Err(ConfigError::Invalid {
                name: "ACCESS_TOKEN_EXPIRE_MINUTES",
                expected: "a positive integer",
                value: token_expire_minutes.to_string(),
            });
        }

        Ok(Self {
            database_url,
            secret_key,
            token_expire_minutes,
            host: parse_var("HOST", IpAddr::from([0, 0, 0, 0]), "an IP address")?,
            port: parse_var("PORT", 8000u16, "a port number")?,
        })
    }
}

fn parse_var<T: std::str::FromStr>(
    name: &'static str,
    default: T,
    expected: &'static str,
) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
            name,
            expected,
            value,
        }),
        Err(_) => Ok(default),
    }
}

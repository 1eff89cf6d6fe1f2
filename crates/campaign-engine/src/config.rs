use std::env;

use thiserror::Error;

const DEFAULT_API_BIND_ADDR: &str = "127.0.0.1:8080";
const DEFAULT_SESSION_IDLE_TTL_SECONDS: u64 = 3600;
const DEFAULT_SESSION_PURGE_INTERVAL_SECONDS: u64 = 60;

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind_addr: String,
    pub session_idle_ttl_seconds: u64,
    pub session_purge_interval_seconds: u64,
    pub json_logs: bool,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required env var {0}")]
    MissingVar(String),
    #[error("invalid integer in env var {key}: {value}")]
    ParseInt { key: String, value: String },
    #[error("invalid number in env var {key}: {value}")]
    ParseFloat { key: String, value: String },
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("failed to load .env file: {0}")]
    Dotenv(String),
    #[error("failed to build http client: {0}")]
    HttpClient(String),
}

impl ApiConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let session_idle_ttl_seconds =
            parse_u64_env("SESSION_IDLE_TTL_SECONDS", DEFAULT_SESSION_IDLE_TTL_SECONDS)?;
        if session_idle_ttl_seconds == 0 {
            return Err(ConfigError::InvalidConfiguration(
                "SESSION_IDLE_TTL_SECONDS must be greater than zero".to_string(),
            ));
        }

        let session_purge_interval_seconds = parse_u64_env(
            "SESSION_PURGE_INTERVAL_SECONDS",
            DEFAULT_SESSION_PURGE_INTERVAL_SECONDS,
        )?;
        if session_purge_interval_seconds == 0 {
            return Err(ConfigError::InvalidConfiguration(
                "SESSION_PURGE_INTERVAL_SECONDS must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            bind_addr: optional_trimmed_env("API_BIND_ADDR")
                .unwrap_or_else(|| DEFAULT_API_BIND_ADDR.to_string()),
            session_idle_ttl_seconds,
            session_purge_interval_seconds,
            json_logs: optional_trimmed_env("LOG_FORMAT")
                .is_some_and(|format| format.eq_ignore_ascii_case("json")),
        })
    }
}

/// Loads `.env` from the working directory when present. A missing file is not an error.
pub fn load_dotenv() -> Result<(), ConfigError> {
    match dotenvy::dotenv() {
        Ok(_) => Ok(()),
        Err(err) if err.not_found() => Ok(()),
        Err(err) => Err(ConfigError::Dotenv(err.to_string())),
    }
}

pub(crate) fn require_non_empty_env(key: &str) -> Result<String, ConfigError> {
    optional_trimmed_env(key).ok_or_else(|| ConfigError::MissingVar(key.to_string()))
}

pub(crate) fn parse_u32_env(key: &str, default: u32) -> Result<u32, ConfigError> {
    match optional_trimmed_env(key) {
        Some(value) => value
            .parse::<u32>()
            .map_err(|_| ConfigError::ParseInt {
                key: key.to_string(),
                value,
            }),
        None => Ok(default),
    }
}

pub(crate) fn parse_u64_env(key: &str, default: u64) -> Result<u64, ConfigError> {
    match optional_trimmed_env(key) {
        Some(value) => value
            .parse::<u64>()
            .map_err(|_| ConfigError::ParseInt {
                key: key.to_string(),
                value,
            }),
        None => Ok(default),
    }
}

pub(crate) fn parse_f32_env(key: &str, default: f32) -> Result<f32, ConfigError> {
    match optional_trimmed_env(key) {
        Some(value) => match value.parse::<f32>() {
            Ok(parsed) if parsed.is_finite() => Ok(parsed),
            _ => Err(ConfigError::ParseFloat {
                key: key.to_string(),
                value,
            }),
        },
        None => Ok(default),
    }
}

pub(crate) fn optional_trimmed_env(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

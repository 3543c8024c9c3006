//! Configuration management for the Snuggle visit tracker

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Frontend origins allowed to send credentialed (cookie) requests
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// `pretty` or `json`
    pub format: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RedisConfig {
    /// Full connection URL. Takes precedence over host/port/password.
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    /// Linear backoff step between reconnect attempts, in milliseconds
    pub retry_step_ms: u64,
    /// Upper bound for a single reconnect delay, in milliseconds
    pub retry_cap_ms: u64,
    /// Attempts made at startup before giving up
    pub connect_attempts: u32,
}

/// Which store backs the visit log and pending counters
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    Redis,
    Memory,
}

/// How the "already counted today" check is performed
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DedupStrategy {
    /// Single `SET NX EX` claim, increments only when the key was created
    Atomic,
    /// `GET` then `SET EX` then `INCR`, racy under concurrent requests
    CheckThenSet,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct VisitsConfig {
    pub backend: StoreBackend,
    pub dedup: DedupStrategy,
    pub log_ttl_secs: u64,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub redis: RedisConfig,
    pub visits: VisitsConfig,
}

impl AppConfig {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let config = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // SNUGGLE_REDIS__RETRY_CAP_MS=1000
            .add_source(
                Environment::with_prefix("SNUGGLE")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("redis.url", env::var("REDIS_URL").ok())?
            .set_override_option("redis.host", env::var("REDIS_HOST").ok())?
            .set_override_option("redis.port", env::var("REDIS_PORT").ok())?
            .set_override_option("redis.password", env::var("REDIS_PASSWORD").ok())?
            .build()?;

        config.try_deserialize()
    }
}

impl RedisConfig {
    /// Connection URL: the explicit `url` if set, else built from host/port/password
    pub fn connection_url(&self) -> String {
        if let Some(url) = self.url.as_deref().filter(|u| !u.is_empty()) {
            return url.to_string();
        }
        match self.password.as_deref().filter(|p| !p.is_empty()) {
            Some(password) => format!("redis://:{}@{}:{}", password, self.host, self.port),
            None => format!("redis://{}:{}", self.host, self.port),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 4000,
            cors_origins: vec!["http://localhost:3000".to_string()],
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: "127.0.0.1".to_string(),
            port: 6379,
            password: None,
            retry_step_ms: 50,
            retry_cap_ms: 2000,
            connect_attempts: 20,
        }
    }
}

impl Default for VisitsConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Redis,
            dedup: DedupStrategy::Atomic,
            log_ttl_secs: 86_400,
        }
    }
}

//! Process configuration, read from the environment (with `.env` loaded first).
//! Required values are validated up front; a bad config stops startup.

pub mod ai;

use std::net::SocketAddr;
use std::time::Duration;

use tracing::info;

use crate::error::ConfigError;
use crate::ingest::config::{load_news_query_default, NewsQuery};

pub use ai::AiConfig;

pub const ENV_DATABASE_URL: &str = "DATABASE_URL";
pub const ENV_NEWS_API_KEY: &str = "NEWS_API_KEY";
pub const ENV_BIND_ADDR: &str = "BIND_ADDR";
pub const ENV_INGEST_INTERVAL_SECS: &str = "INGEST_INTERVAL_SECS";
pub const ENV_INGEST_RUN_ON_STARTUP: &str = "INGEST_RUN_ON_STARTUP";
pub const ENV_HTTP_TIMEOUT_SECS: &str = "HTTP_TIMEOUT_SECS";
pub const ENV_STORE: &str = "STORE";

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";
pub const DEFAULT_INGEST_INTERVAL_SECS: u64 = 24 * 3600;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

/// Where sightings are persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres { database_url: String },
    /// Process-local store, for local runs without a database.
    Memory,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub store: StoreBackend,
    pub news_api_key: String,
    pub news_query: NewsQuery,
    pub ai: AiConfig,
    pub bind_addr: SocketAddr,
    pub ingest_interval: Duration,
    pub run_on_startup: bool,
    pub http_timeout: Duration,
}

impl AppConfig {
    /// Reads the process environment; `.env` is loaded by the binary before this.
    pub fn from_env() -> Result<Self, ConfigError> {
        let news_query =
            load_news_query_default().map_err(|e| ConfigError::NewsQuery(format!("{e:#}")))?;
        Self::from_lookup(|k| std::env::var(k).ok(), news_query)
    }

    /// Build from an arbitrary key lookup (the environment in production).
    pub fn from_lookup<F>(lookup: F, news_query: NewsQuery) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let store = match lookup(ENV_STORE).as_deref().map(str::trim) {
            Some(s) if s.eq_ignore_ascii_case("memory") => StoreBackend::Memory,
            None | Some("") => StoreBackend::Postgres {
                database_url: required(&lookup, ENV_DATABASE_URL)?,
            },
            Some(s) if s.eq_ignore_ascii_case("postgres") => StoreBackend::Postgres {
                database_url: required(&lookup, ENV_DATABASE_URL)?,
            },
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: ENV_STORE,
                    value: other.to_string(),
                })
            }
        };

        let news_api_key = required(&lookup, ENV_NEWS_API_KEY)?;
        let ai = AiConfig::from_lookup(&lookup)?;

        let bind_raw = lookup(ENV_BIND_ADDR).unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_raw
            .trim()
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::Invalid {
                key: ENV_BIND_ADDR,
                value: bind_raw.clone(),
            })?;

        let interval_secs =
            positive_secs(&lookup, ENV_INGEST_INTERVAL_SECS, DEFAULT_INGEST_INTERVAL_SECS)?;
        let timeout_secs =
            positive_secs(&lookup, ENV_HTTP_TIMEOUT_SECS, DEFAULT_HTTP_TIMEOUT_SECS)?;

        let run_on_startup = match lookup(ENV_INGEST_RUN_ON_STARTUP) {
            None => false,
            Some(v) => parse_flag(&v).ok_or(ConfigError::Invalid {
                key: ENV_INGEST_RUN_ON_STARTUP,
                value: v,
            })?,
        };

        Ok(Self {
            store,
            news_api_key,
            news_query,
            ai,
            bind_addr,
            ingest_interval: Duration::from_secs(interval_secs),
            run_on_startup,
            http_timeout: Duration::from_secs(timeout_secs),
        })
    }

    /// Safe diagnostics: key lengths only, never values.
    pub fn log_summary(&self) {
        let store = match &self.store {
            StoreBackend::Postgres { .. } => "postgres",
            StoreBackend::Memory => "memory",
        };
        info!(
            store,
            bind = %self.bind_addr,
            news_key_len = self.news_api_key.len(),
            ai_enabled = self.ai.enabled(),
            ai_model = %self.ai.model,
            keyword = %self.news_query.keyword,
            domains = ?self.news_query.domains,
            interval_secs = self.ingest_interval.as_secs(),
            run_on_startup = self.run_on_startup,
            "config loaded"
        );
    }
}

fn required<F>(lookup: &F, key: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing(key))
}

fn positive_secs<F>(lookup: &F, key: &'static str, default: u64) -> Result<u64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => {
            let parsed = raw.trim().parse::<u64>();
            match parsed {
                Ok(n) if n > 0 => Ok(n),
                _ => Err(ConfigError::Invalid { key, value: raw }),
            }
        }
    }
}

fn parse_flag(v: &str) -> Option<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

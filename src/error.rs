//! Typed errors for configuration, storage, and outbound providers.

use thiserror::Error;

/// Startup configuration problems. Fatal: the process does not start serving.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },

    #[error("news query config: {0}")]
    NewsQuery(String),
}

/// Storage failures.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A row with this `source_url` already exists.
    #[error("duplicate source_url: {0}")]
    Duplicate(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Failures of the news, language-model, or geocoding provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{provider} request failed: {source}")]
    Transport {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{provider} returned HTTP {status}")]
    Status { provider: &'static str, status: u16 },

    #[error("{provider} payload malformed: {detail}")]
    Malformed {
        provider: &'static str,
        detail: String,
    },

    #[error("{provider} is disabled")]
    Disabled { provider: &'static str },
}

impl ProviderError {
    pub fn provider(&self) -> &'static str {
        match self {
            ProviderError::Transport { provider, .. }
            | ProviderError::Status { provider, .. }
            | ProviderError::Malformed { provider, .. }
            | ProviderError::Disabled { provider } => provider,
        }
    }

    pub(crate) fn malformed(provider: &'static str, detail: impl ToString) -> Self {
        ProviderError::Malformed {
            provider,
            detail: detail.to_string(),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimestampError {
    #[error("unparsable timestamp {0:?}")]
    Unparsable(String),
}

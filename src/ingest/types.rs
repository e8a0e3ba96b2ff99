// src/ingest/types.rs
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// One raw article as returned by the news provider (NewsAPI field names).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub url_to_image: Option<String>,
    #[serde(default)]
    pub published_at: Option<String>,
}

impl Article {
    /// Trimmed source URL, `None` when missing or blank.
    pub fn source_url(&self) -> Option<&str> {
        self.url.as_deref().map(str::trim).filter(|u| !u.is_empty())
    }
}

#[async_trait::async_trait]
pub trait NewsProvider: Send + Sync {
    async fn fetch_latest(&self) -> Result<Vec<Article>, ProviderError>;
    fn name(&self) -> &'static str;
}

// src/ingest/providers/newsapi.rs
use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use metrics::histogram;
use serde::Deserialize;

use crate::error::ProviderError;
use crate::ingest::config::NewsQuery;
use crate::ingest::types::{Article, NewsProvider};

pub const NEWSAPI_EVERYTHING_URL: &str = "https://newsapi.org/v2/everything";
const PROVIDER: &str = "newsapi";

#[derive(Debug, Deserialize)]
struct EverythingResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    articles: Vec<Article>,
}

/// NewsAPI `/v2/everything` client.
pub struct NewsApiProvider {
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Http {
        url: String,
        api_key: String,
        query: NewsQuery,
        client: reqwest::Client,
    },
}

impl NewsApiProvider {
    pub fn new(client: reqwest::Client, api_key: impl Into<String>, query: NewsQuery) -> Self {
        Self {
            mode: Mode::Http {
                url: NEWSAPI_EVERYTHING_URL.to_string(),
                api_key: api_key.into(),
                query,
                client,
            },
        }
    }

    /// Point an HTTP provider at a different endpoint. No-op for fixtures.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        if let Mode::Http { url, .. } = &mut self.mode {
            *url = endpoint.into();
        }
        self
    }

    /// Serve a canned `/v2/everything` response body instead of calling the API.
    pub fn from_fixture_str(body: &str) -> Self {
        Self {
            mode: Mode::Fixture(body.to_string()),
        }
    }

    /// Query parameters for a batch running on `today`.
    pub fn query_params(query: &NewsQuery, today: NaiveDate) -> Vec<(&'static str, String)> {
        let mut params = vec![("q", query.keyword.clone())];
        if !query.domains.is_empty() {
            params.push(("domains", query.domains_csv()));
        }
        params.push(("from", query.from_date(today)));
        params.push(("sortBy", "publishedAt".to_string()));
        params
    }

    pub fn parse_articles_from_str(body: &str) -> Result<Vec<Article>, ProviderError> {
        let t0 = std::time::Instant::now();
        let resp: EverythingResponse =
            serde_json::from_str(body).map_err(|e| ProviderError::malformed(PROVIDER, e))?;

        if resp.status.as_deref() == Some("error") {
            return Err(ProviderError::malformed(
                PROVIDER,
                format!(
                    "{}: {}",
                    resp.code.as_deref().unwrap_or("error"),
                    resp.message.as_deref().unwrap_or("no message")
                ),
            ));
        }

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("ingest_parse_ms").record(ms);
        Ok(resp.articles)
    }
}

#[async_trait]
impl NewsProvider for NewsApiProvider {
    async fn fetch_latest(&self) -> Result<Vec<Article>, ProviderError> {
        match &self.mode {
            Mode::Fixture(body) => Self::parse_articles_from_str(body),

            Mode::Http {
                url,
                api_key,
                query,
                client,
            } => {
                let params = Self::query_params(query, Local::now().date_naive());
                let resp = client
                    .get(url.as_str())
                    .query(&params)
                    .bearer_auth(api_key)
                    .send()
                    .await
                    .map_err(|source| ProviderError::Transport {
                        provider: PROVIDER,
                        source,
                    })?;

                let status = resp.status();
                if !status.is_success() {
                    return Err(ProviderError::Status {
                        provider: PROVIDER,
                        status: status.as_u16(),
                    });
                }

                let body = resp.text().await.map_err(|source| ProviderError::Transport {
                    provider: PROVIDER,
                    source,
                })?;
                Self::parse_articles_from_str(&body)
            }
        }
    }

    fn name(&self) -> &'static str {
        PROVIDER
    }
}

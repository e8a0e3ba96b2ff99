// src/ingest/config.rs
use anyhow::{anyhow, Context, Result};
use chrono::{Days, NaiveDate};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const ENV_NEWS_QUERY_PATH: &str = "NEWS_QUERY_PATH";
const DEFAULT_TOML_PATH: &str = "config/news_query.toml";
const DEFAULT_JSON_PATH: &str = "config/news_query.json";

pub const DEFAULT_KEYWORD: &str = "クマ";
pub const DEFAULT_DOMAINS: &[&str] = &["web.nhk"];
pub const DEFAULT_LOOKBACK_DAYS: u32 = 1;

/// Search filter sent to the news provider on every batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewsQuery {
    pub keyword: String,
    /// Source allowlist (NewsAPI `domains`).
    pub domains: Vec<String>,
    /// Lower bound on publication date, in days before today.
    pub lookback_days: u32,
}

impl Default for NewsQuery {
    fn default() -> Self {
        Self {
            keyword: DEFAULT_KEYWORD.to_string(),
            domains: DEFAULT_DOMAINS.iter().map(|d| d.to_string()).collect(),
            lookback_days: DEFAULT_LOOKBACK_DAYS,
        }
    }
}

impl NewsQuery {
    /// `from` parameter for a batch running on `today`.
    pub fn from_date(&self, today: NaiveDate) -> String {
        today
            .checked_sub_days(Days::new(u64::from(self.lookback_days)))
            .unwrap_or(today)
            .format("%Y-%m-%d")
            .to_string()
    }

    pub fn domains_csv(&self) -> String {
        self.domains.join(",")
    }
}

#[derive(Debug, Deserialize)]
struct RawNewsQuery {
    keyword: Option<String>,
    domains: Option<Vec<String>>,
    lookback_days: Option<u32>,
}

impl RawNewsQuery {
    fn into_query(self) -> Result<NewsQuery> {
        let defaults = NewsQuery::default();
        let keyword = match self.keyword {
            Some(k) if k.trim().is_empty() => return Err(anyhow!("keyword must not be empty")),
            Some(k) => k.trim().to_string(),
            None => defaults.keyword,
        };
        let domains = match self.domains {
            Some(d) => clean_list(d),
            None => defaults.domains,
        };
        Ok(NewsQuery {
            keyword,
            domains,
            lookback_days: self.lookback_days.unwrap_or(defaults.lookback_days),
        })
    }
}

/// Load the query from an explicit path. Supports TOML or JSON formats.
pub fn load_news_query_from(path: &Path) -> Result<NewsQuery> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading news query from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_news_query(&content, ext.as_str())
        .with_context(|| format!("parsing news query from {}", path.display()))
}

/// Load the query using env var + fallbacks:
/// 1) $NEWS_QUERY_PATH
/// 2) config/news_query.toml
/// 3) config/news_query.json
/// 4) built-in defaults
pub fn load_news_query_default() -> Result<NewsQuery> {
    if let Ok(p) = std::env::var(ENV_NEWS_QUERY_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_news_query_from(&pb);
        } else {
            return Err(anyhow!("NEWS_QUERY_PATH points to non-existent path"));
        }
    }
    let toml_p = PathBuf::from(DEFAULT_TOML_PATH);
    if toml_p.exists() {
        return load_news_query_from(&toml_p);
    }
    let json_p = PathBuf::from(DEFAULT_JSON_PATH);
    if json_p.exists() {
        return load_news_query_from(&json_p);
    }
    Ok(NewsQuery::default())
}

fn parse_news_query(s: &str, hint_ext: &str) -> Result<NewsQuery> {
    let raw: RawNewsQuery = if hint_ext == "json" {
        serde_json::from_str(s)?
    } else {
        toml::from_str(s)?
    };
    raw.into_query()
}

fn clean_list(items: Vec<String>) -> Vec<String> {
    use std::collections::BTreeSet;
    let mut set = BTreeSet::new();
    for it in items {
        let t = it.trim();
        if !t.is_empty() {
            set.insert(t.to_string());
        }
    }
    set.into_iter().collect()
}

// src/ingest/mod.rs
pub mod config;
pub mod providers;
pub mod scheduler;
pub mod types;

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use metrics::{counter, gauge, histogram};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::analyze::extractor::SightingVerdict;
use crate::context::AppContext;
use crate::error::{StoreError, TimestampError};
use crate::geocode::{self, Coordinates};
use crate::ingest::types::{Article, NewsProvider};
use crate::models::{NewSighting, Sighting};

/// Stored when the model gives no usable summary.
pub const NO_SUMMARY_PLACEHOLDER: &str = "No summary available";

/// Normalize text: decode entities, strip tags, unify quotes, collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, "").to_string();

    // 3) Normalize “ ” ‘ ’ « » to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace (includes NBSP and ideographic space)
    static RE_WS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").to_string();
    out.trim().to_string()
}

/// Accepts RFC 3339 (`2025-10-01T06:30:00Z`, `...+09:00`). Falls back to a
/// naive `YYYY-MM-DDTHH:MM:SS[.fff]`, read as UTC. Anything else is an error.
pub fn parse_published_at(raw: &str) -> Result<DateTime<Utc>, TimestampError> {
    let s = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|_| TimestampError::Unparsable(raw.to_string()))
}

// ------------------------------------------------------------
// Per-article outcomes
// ------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SkipReason {
    MissingUrl,
    AlreadyStored,
    LookupFailed,
    NotSighting,
    ExtractFailed,
    BadTimestamp,
    Duplicate,
    StoreFailed,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::MissingUrl => "missing_url",
            SkipReason::AlreadyStored => "already_stored",
            SkipReason::LookupFailed => "lookup_failed",
            SkipReason::NotSighting => "not_sighting",
            SkipReason::ExtractFailed => "extract_failed",
            SkipReason::BadTimestamp => "bad_timestamp",
            SkipReason::Duplicate => "duplicate",
            SkipReason::StoreFailed => "store_failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArticleOutcome {
    Saved(Sighting),
    Skipped(SkipReason),
}

/// Summary of one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub fetched: usize,
    /// Newly stored records.
    pub saved: usize,
    pub skipped: BTreeMap<&'static str, usize>,
}

impl BatchReport {
    fn record(&mut self, outcome: &ArticleOutcome) {
        match outcome {
            ArticleOutcome::Saved(_) => self.saved += 1,
            ArticleOutcome::Skipped(reason) => {
                *self.skipped.entry(reason.as_str()).or_default() += 1;
            }
        }
    }

    pub fn skipped_for(&self, reason: SkipReason) -> usize {
        self.skipped.get(reason.as_str()).copied().unwrap_or(0)
    }
}

// ------------------------------------------------------------
// Pipeline
// ------------------------------------------------------------

/// Fetch the day's articles. Provider failures are logged and yield nothing.
pub async fn fetch_articles(provider: &dyn NewsProvider) -> Vec<Article> {
    match provider.fetch_latest().await {
        Ok(articles) => {
            counter!("ingest_articles_total").increment(articles.len() as u64);
            articles
        }
        Err(e) => {
            warn!(target: "ingest", error = %e, provider = provider.name(), "news provider error");
            counter!("ingest_provider_errors_total", "provider" => e.provider()).increment(1);
            Vec::new()
        }
    }
}

/// Merge an article, its verdict and coordinates into a storable record.
pub fn assemble_record(
    article: &Article,
    source_url: &str,
    verdict: SightingVerdict,
    coordinates: Option<Coordinates>,
    published_at: DateTime<Utc>,
) -> NewSighting {
    NewSighting {
        prefecture: verdict.prefecture,
        city: verdict.city,
        latitude: coordinates.map(|c| c.latitude),
        longitude: coordinates.map(|c| c.longitude),
        summary: verdict
            .summary
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| NO_SUMMARY_PLACEHOLDER.to_string()),
        source_url: source_url.to_string(),
        image_url: article
            .url_to_image
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(str::to_string),
        published_at,
    }
}

/// Run one article through dedup → extract → geocode → timestamp → persist.
pub async fn process_article(ctx: &AppContext, article: &Article) -> ArticleOutcome {
    use ArticleOutcome::Skipped;

    // a) URL is the dedup key
    let Some(url) = article.source_url() else {
        debug!(target: "ingest", title = ?article.title, "article without url");
        return Skipped(SkipReason::MissingUrl);
    };

    // b) already stored?
    match ctx.store.exists_by_url(url).await {
        Ok(true) => return Skipped(SkipReason::AlreadyStored),
        Ok(false) => {}
        Err(e) => {
            error!(target: "ingest", url, error = %e, "dedup lookup failed");
            return Skipped(SkipReason::LookupFailed);
        }
    }

    // c) classify + extract (single call)
    let title = article.title.as_deref().unwrap_or_default();
    let description = article.description.as_deref().unwrap_or_default();
    info!(target: "ingest", url, title, "analyzing article");
    let verdict = match ctx.extractor.extract(title, description).await {
        Ok(v) if v.is_sighting => v,
        Ok(_) => return Skipped(SkipReason::NotSighting),
        Err(e) => {
            warn!(
                target: "ingest",
                url,
                error = %e,
                provider = ctx.extractor.provider_name(),
                "extraction failed"
            );
            counter!("ingest_provider_errors_total", "provider" => e.provider()).increment(1);
            return Skipped(SkipReason::ExtractFailed);
        }
    };

    // d) geocode; failure is "no coordinates"
    let coordinates = geocode::locate(
        ctx.geocoder.as_ref(),
        verdict.prefecture.as_deref(),
        verdict.city.as_deref(),
    )
    .await;

    // e) publication timestamp
    let published_at = match article
        .published_at
        .as_deref()
        .ok_or_else(|| TimestampError::Unparsable(String::new()))
        .and_then(parse_published_at)
    {
        Ok(ts) => ts,
        Err(e) => {
            error!(target: "ingest", url, error = %e, "dropping article with bad publishedAt");
            return Skipped(SkipReason::BadTimestamp);
        }
    };

    // f) persist
    let record = assemble_record(article, url, verdict, coordinates, published_at);
    match ctx.store.insert(record).await {
        Ok(saved) => {
            info!(
                target: "ingest",
                id = saved.id,
                url,
                geocoded = coordinates.is_some(),
                "sighting saved"
            );
            ArticleOutcome::Saved(saved)
        }
        Err(StoreError::Duplicate(_)) => {
            warn!(target: "ingest", url, "concurrent insert won the race; skipping");
            Skipped(SkipReason::Duplicate)
        }
        Err(e) => {
            error!(target: "ingest", url, error = %e, "failed to save sighting");
            Skipped(SkipReason::StoreFailed)
        }
    }
}

/// One full batch. Never fails: every per-article failure becomes a skip.
pub async fn run_ingestion_batch(ctx: &AppContext) -> BatchReport {
    let t0 = std::time::Instant::now();
    info!(target: "ingest", "ingest batch started");

    let articles = fetch_articles(ctx.news.as_ref()).await;
    let mut report = BatchReport {
        fetched: articles.len(),
        ..BatchReport::default()
    };
    if articles.is_empty() {
        info!(target: "ingest", "no articles retrieved");
    }

    for article in &articles {
        let outcome = process_article(ctx, article).await;
        if let ArticleOutcome::Skipped(reason) = &outcome {
            counter!("ingest_skipped_total", "reason" => reason.as_str()).increment(1);
        }
        report.record(&outcome);
    }

    let now = Utc::now().timestamp().max(0);
    counter!("ingest_batches_total").increment(1);
    counter!("ingest_saved_total").increment(report.saved as u64);
    histogram!("ingest_batch_duration_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
    gauge!("ingest_last_run_ts").set(now as f64);

    info!(
        target: "ingest",
        fetched = report.fetched,
        saved = report.saved,
        skipped = ?report.skipped,
        "ingest batch completed"
    );
    report
}

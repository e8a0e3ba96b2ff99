// tests/common/mod.rs
//
// Fakes for the outbound collaborators, shared by the integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bear_sighting_api::analyze::extractor::{ExtractFuture, SightingExtractor, SightingVerdict};
use bear_sighting_api::context::AppContext;
use bear_sighting_api::error::ProviderError;
use bear_sighting_api::geocode::{Coordinates, GeocodeFuture, Geocoder};
use bear_sighting_api::ingest::types::{Article, NewsProvider};
use bear_sighting_api::store::{MemorySightingStore, SightingStore};

pub fn article(url: &str, title: &str, published_at: &str) -> Article {
    Article {
        title: Some(title.to_string()),
        description: Some(format!("{title}。警察が注意を呼びかけています。")),
        url: Some(url.to_string()),
        url_to_image: Some(format!("{url}/image.jpg")),
        published_at: Some(published_at.to_string()),
    }
}

pub fn sighting(prefecture: &str, city: &str, summary: &str) -> SightingVerdict {
    SightingVerdict {
        is_sighting: true,
        prefecture: Some(prefecture.to_string()),
        city: Some(city.to_string()),
        summary: Some(summary.to_string()),
    }
}

// ---- News ----

/// Returns the same articles on every fetch.
pub struct FixedNews(pub Vec<Article>);

#[async_trait]
impl NewsProvider for FixedNews {
    async fn fetch_latest(&self) -> Result<Vec<Article>, ProviderError> {
        Ok(self.0.clone())
    }
    fn name(&self) -> &'static str {
        "fixed"
    }
}

pub struct FailingNews;

#[async_trait]
impl NewsProvider for FailingNews {
    async fn fetch_latest(&self) -> Result<Vec<Article>, ProviderError> {
        Err(ProviderError::Status {
            provider: "newsapi",
            status: 429,
        })
    }
    fn name(&self) -> &'static str {
        "failing"
    }
}

// ---- Extractor ----

/// Verdicts keyed by title. Unknown titles are negative; listed failures error.
#[derive(Default)]
pub struct ScriptedExtractor {
    verdicts: HashMap<String, SightingVerdict>,
    failures: Vec<String>,
    pub calls: AtomicUsize,
}

impl ScriptedExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, title: &str, verdict: SightingVerdict) -> Self {
        self.verdicts.insert(title.to_string(), verdict);
        self
    }

    pub fn failing_on(mut self, title: &str) -> Self {
        self.failures.push(title.to_string());
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SightingExtractor for ScriptedExtractor {
    fn extract<'a>(&'a self, title: &'a str, _description: &'a str) -> ExtractFuture<'a> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let out = if self.failures.iter().any(|t| t == title) {
            Err(ProviderError::Malformed {
                provider: "scripted",
                detail: "not json".to_string(),
            })
        } else {
            Ok(self
                .verdicts
                .get(title)
                .cloned()
                .unwrap_or_else(SightingVerdict::negative))
        };
        Box::pin(async move { out })
    }
    fn provider_name(&self) -> &'static str {
        "scripted"
    }
}

// ---- Geocoder ----

/// Resolves queries from a table; records every query it sees.
#[derive(Default)]
pub struct TableGeocoder {
    table: HashMap<String, Coordinates>,
    fail_all: bool,
    pub seen: Mutex<Vec<String>>,
}

impl TableGeocoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, query: &str, latitude: f64, longitude: f64) -> Self {
        self.table.insert(
            query.to_string(),
            Coordinates {
                latitude,
                longitude,
            },
        );
        self
    }

    pub fn failing() -> Self {
        Self {
            fail_all: true,
            ..Self::default()
        }
    }
}

impl Geocoder for TableGeocoder {
    fn geocode<'a>(&'a self, query: &'a str) -> GeocodeFuture<'a> {
        self.seen.lock().unwrap().push(query.to_string());
        let out = if self.fail_all {
            Err(ProviderError::Status {
                provider: "nominatim",
                status: 503,
            })
        } else {
            Ok(self.table.get(query).copied())
        };
        Box::pin(async move { out })
    }
    fn name(&self) -> &'static str {
        "table"
    }
}

// ---- Wiring ----

pub struct Harness {
    pub ctx: AppContext,
    pub store: Arc<MemorySightingStore>,
    pub extractor: Arc<ScriptedExtractor>,
    pub geocoder: Arc<TableGeocoder>,
}

pub fn harness(
    news: impl NewsProvider + 'static,
    extractor: ScriptedExtractor,
    geocoder: TableGeocoder,
) -> Harness {
    harness_with_store(Arc::new(MemorySightingStore::new()), news, extractor, geocoder)
}

pub fn harness_with_store(
    store: Arc<MemorySightingStore>,
    news: impl NewsProvider + 'static,
    extractor: ScriptedExtractor,
    geocoder: TableGeocoder,
) -> Harness {
    let extractor = Arc::new(extractor);
    let geocoder = Arc::new(geocoder);
    let ctx = AppContext::new(
        store.clone() as Arc<dyn SightingStore>,
        Arc::new(news),
        extractor.clone(),
        geocoder.clone(),
    );
    Harness {
        ctx,
        store,
        extractor,
        geocoder,
    }
}

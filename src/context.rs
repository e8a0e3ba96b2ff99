//! Application context: everything a batch run and the read API need,
//! built once at startup and passed explicitly.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{info, warn};

use crate::analyze::extractor::{build_extractor, DynExtractor};
use crate::config::{AppConfig, StoreBackend};
use crate::geocode::{DynGeocoder, NominatimGeocoder};
use crate::ingest::providers::newsapi::NewsApiProvider;
use crate::ingest::types::NewsProvider;
use crate::store::{MemorySightingStore, PgSightingStore, SightingStore};

pub struct AppContext {
    pub store: Arc<dyn SightingStore>,
    pub news: Arc<dyn NewsProvider>,
    pub extractor: DynExtractor,
    pub geocoder: DynGeocoder,
    /// Held for the whole of a batch run so ticks cannot overlap.
    run_lock: Mutex<()>,
}

impl AppContext {
    pub fn new(
        store: Arc<dyn SightingStore>,
        news: Arc<dyn NewsProvider>,
        extractor: DynExtractor,
        geocoder: DynGeocoder,
    ) -> Self {
        Self {
            store,
            news,
            extractor,
            geocoder,
            run_lock: Mutex::new(()),
        }
    }

    /// Wire the production collaborators from config: connects (and migrates)
    /// the database, builds one shared HTTP client with finite timeouts.
    pub async fn from_config(cfg: &AppConfig) -> Result<Self> {
        let http = build_http_client(cfg.http_timeout)?;

        let store: Arc<dyn SightingStore> = match &cfg.store {
            StoreBackend::Postgres { database_url } => {
                let pg = PgSightingStore::connect(database_url)
                    .await
                    .context("connecting to database")?;
                pg.migrate()
                    .await
                    .context("creating bear_sightings schema")?;
                info!("database ready");
                Arc::new(pg)
            }
            StoreBackend::Memory => {
                warn!("using in-memory store; sightings are lost on restart");
                Arc::new(MemorySightingStore::new())
            }
        };

        if !cfg.ai.enabled() {
            warn!("OPENAI_API_KEY not set; extractor disabled, no sightings will be stored");
        }

        let news = Arc::new(NewsApiProvider::new(
            http.clone(),
            cfg.news_api_key.clone(),
            cfg.news_query.clone(),
        ));
        let extractor = build_extractor(&cfg.ai, http.clone());
        let geocoder = Arc::new(NominatimGeocoder::new(http));

        Ok(Self::new(store, news, extractor, geocoder))
    }

    /// `None` when another batch is still running.
    pub fn try_begin_run(&self) -> Option<MutexGuard<'_, ()>> {
        self.run_lock.try_lock().ok()
    }

    /// Release the store on shutdown.
    pub async fn close(&self) {
        self.store.close().await;
    }
}

pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(4))
        .timeout(timeout)
        .build()
        .context("building http client")
}

//! Locator: (prefecture, city) → coordinates via OSM Nominatim.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::ProviderError;

pub const NOMINATIM_SEARCH_URL: &str = "https://nominatim.openstreetmap.org/search";
const USER_AGENT: &str = "bear-sighting-api/0.1";
const MAX_QUERY_CHARS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

pub type GeocodeFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Option<Coordinates>, ProviderError>> + Send + 'a>>;

pub trait Geocoder: Send + Sync {
    /// `Ok(None)` means the provider answered but found nothing.
    fn geocode<'a>(&'a self, query: &'a str) -> GeocodeFuture<'a>;
    fn name(&self) -> &'static str;
}

pub type DynGeocoder = Arc<dyn Geocoder>;

/// Search string for a location, or `None` unless both parts are present.
pub fn location_query(prefecture: Option<&str>, city: Option<&str>) -> Option<String> {
    let prefecture = prefecture.map(str::trim).filter(|s| !s.is_empty())?;
    let city = city.map(str::trim).filter(|s| !s.is_empty())?;
    let q = format!("{prefecture} {city}");
    if q.chars().count() > MAX_QUERY_CHARS {
        return None;
    }
    Some(q)
}

/// Resolve a location, folding every failure into "no coordinates".
pub async fn locate(
    geocoder: &dyn Geocoder,
    prefecture: Option<&str>,
    city: Option<&str>,
) -> Option<Coordinates> {
    let query = location_query(prefecture, city)?;
    match geocoder.geocode(&query).await {
        Ok(Some(c)) => Some(c),
        Ok(None) => {
            debug!(target: "ingest", query = %query, "geocoder found no match");
            None
        }
        Err(e) => {
            warn!(
                target: "ingest",
                query = %query,
                error = %e,
                provider = geocoder.name(),
                "geocoding failed"
            );
            metrics::counter!("ingest_provider_errors_total", "provider" => e.provider())
                .increment(1);
            None
        }
    }
}

#[derive(Debug, Deserialize)]
struct NominatimResult {
    lat: String,
    lon: String,
}

/// Parse a Nominatim `format=json` body; first hit wins.
pub fn parse_nominatim(body: &str) -> Result<Option<Coordinates>, ProviderError> {
    let results: Vec<NominatimResult> =
        serde_json::from_str(body).map_err(|e| ProviderError::malformed("nominatim", e))?;
    let Some(first) = results.into_iter().next() else {
        return Ok(None);
    };
    let latitude: f64 = first
        .lat
        .parse()
        .map_err(|e| ProviderError::malformed("nominatim", format!("lat {:?}: {e}", first.lat)))?;
    let longitude: f64 = first
        .lon
        .parse()
        .map_err(|e| ProviderError::malformed("nominatim", format!("lon {:?}: {e}", first.lon)))?;
    Ok(Some(Coordinates {
        latitude,
        longitude,
    }))
}

pub struct NominatimGeocoder {
    http: reqwest::Client,
    endpoint: String,
}

impl NominatimGeocoder {
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            endpoint: NOMINATIM_SEARCH_URL.to_string(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    async fn geocode_impl(&self, query: &str) -> Result<Option<Coordinates>, ProviderError> {
        let resp = self
            .http
            .get(&self.endpoint)
            .query(&[
                ("q", query),
                ("format", "json"),
                ("limit", "1"),
                ("countrycodes", "jp"),
            ])
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .send()
            .await
            .map_err(|source| ProviderError::Transport {
                provider: "nominatim",
                source,
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ProviderError::Status {
                provider: "nominatim",
                status: status.as_u16(),
            });
        }
        let body = resp.text().await.map_err(|source| ProviderError::Transport {
            provider: "nominatim",
            source,
        })?;
        parse_nominatim(&body)
    }
}

impl Geocoder for NominatimGeocoder {
    fn geocode<'a>(&'a self, query: &'a str) -> GeocodeFuture<'a> {
        Box::pin(self.geocode_impl(query))
    }
    fn name(&self) -> &'static str {
        "nominatim"
    }
}

// tests/ingest_pipeline.rs
//
// Batch-level behavior of run_ingestion_batch against faked providers and the
// in-memory store.

mod common;

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use bear_sighting_api::error::StoreError;
use bear_sighting_api::ingest::{run_ingestion_batch, SkipReason, NO_SUMMARY_PLACEHOLDER};
use bear_sighting_api::models::{NewSighting, Sighting};
use bear_sighting_api::store::{MemorySightingStore, SightingStore};
use bear_sighting_api::AppContext;
use chrono::{TimeZone, Utc};

use common::*;

const T1: &str = "秋田市の住宅地でクマ目撃";
const T2: &str = "盛岡市でクマが出没";
const T3: &str = "富山市の河川敷にクマ";

fn three_sightings() -> (Vec<bear_sighting_api::ingest::types::Article>, ScriptedExtractor) {
    let articles = vec![
        article("https://www3.nhk.or.jp/news/a", T1, "2025-10-01T06:30:00Z"),
        article("https://www3.nhk.or.jp/news/b", T2, "2025-10-01T07:00:00Z"),
        article("https://www3.nhk.or.jp/news/c", T3, "2025-10-01T08:15:00Z"),
    ];
    let extractor = ScriptedExtractor::new()
        .with(T1, sighting("秋田県", "秋田市", "住宅地でクマ1頭が目撃された。"))
        .with(T2, sighting("岩手県", "盛岡市", "市街地にクマが出没した。"))
        .with(T3, sighting("富山県", "富山市", "河川敷でクマが目撃された。"));
    (articles, extractor)
}

#[tokio::test]
async fn stores_each_sighting_with_all_fields() {
    let (articles, extractor) = three_sightings();
    let geo = TableGeocoder::new().with("秋田県 秋田市", 39.72, 140.10);
    let h = harness(FixedNews(articles), extractor, geo);

    let report = run_ingestion_batch(&h.ctx).await;
    assert_eq!(report.fetched, 3);
    assert_eq!(report.saved, 3);

    let rows = h.store.list_all().await.unwrap();
    let first = &rows[0];
    assert_eq!(first.id, 1);
    assert_eq!(first.prefecture.as_deref(), Some("秋田県"));
    assert_eq!(first.city.as_deref(), Some("秋田市"));
    assert_eq!(first.latitude, Some(39.72));
    assert_eq!(first.longitude, Some(140.10));
    assert_eq!(first.summary, "住宅地でクマ1頭が目撃された。");
    assert_eq!(first.source_url, "https://www3.nhk.or.jp/news/a");
    assert_eq!(
        first.image_url.as_deref(),
        Some("https://www3.nhk.or.jp/news/a/image.jpg")
    );
    assert_eq!(
        first.published_at,
        Utc.with_ymd_and_hms(2025, 10, 1, 6, 30, 0).unwrap()
    );
}

#[tokio::test]
async fn second_run_over_same_articles_saves_nothing() {
    let (articles, extractor) = three_sightings();
    let h = harness(FixedNews(articles), extractor, TableGeocoder::new());

    let first = run_ingestion_batch(&h.ctx).await;
    let second = run_ingestion_batch(&h.ctx).await;

    assert_eq!(first.saved, 3);
    assert_eq!(second.saved, 0);
    assert_eq!(second.skipped_for(SkipReason::AlreadyStored), 3);
    assert_eq!(h.store.len().await, 3);
    // Already-seen URLs never reach the extractor again.
    assert_eq!(h.extractor.call_count(), 3);
}

#[tokio::test]
async fn duplicate_urls_in_one_batch_store_once() {
    let articles = vec![
        article("https://www3.nhk.or.jp/news/a", T1, "2025-10-01T06:30:00Z"),
        article("https://www3.nhk.or.jp/news/a", T1, "2025-10-01T06:30:00Z"),
        article(" https://www3.nhk.or.jp/news/a ", T1, "2025-10-01T06:30:00Z"),
    ];
    let extractor = ScriptedExtractor::new().with(T1, sighting("秋田県", "秋田市", "s"));
    let h = harness(FixedNews(articles), extractor, TableGeocoder::new());

    let report = run_ingestion_batch(&h.ctx).await;
    assert_eq!(report.saved, 1);

    let urls: Vec<String> = h
        .store
        .list_all()
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.source_url)
        .collect();
    let distinct: HashSet<&String> = urls.iter().collect();
    assert_eq!(distinct.len(), urls.len());
}

#[tokio::test]
async fn negative_verdict_is_never_stored() {
    let articles = vec![
        article(
            "https://www3.nhk.or.jp/news/policy",
            "クマ対策の予算を拡充",
            "2025-10-01T06:30:00Z",
        ),
        article("https://www3.nhk.or.jp/news/a", T1, "2025-10-01T06:30:00Z"),
    ];
    let extractor = ScriptedExtractor::new().with(T1, sighting("秋田県", "秋田市", "s"));
    let h = harness(FixedNews(articles), extractor, TableGeocoder::new());

    let report = run_ingestion_batch(&h.ctx).await;
    assert_eq!(report.saved, 1);
    assert_eq!(report.skipped_for(SkipReason::NotSighting), 1);
    assert!(!h
        .store
        .exists_by_url("https://www3.nhk.or.jp/news/policy")
        .await
        .unwrap());
    // Negative verdicts skip geocoding entirely.
    assert_eq!(h.geocoder.seen.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn extractor_failure_skips_like_a_negative() {
    let (articles, extractor) = three_sightings();
    let h = harness(FixedNews(articles), extractor.failing_on(T2), TableGeocoder::new());

    let report = run_ingestion_batch(&h.ctx).await;
    assert_eq!(report.saved, 2);
    assert_eq!(report.skipped_for(SkipReason::ExtractFailed), 1);
    assert!(!h
        .store
        .exists_by_url("https://www3.nhk.or.jp/news/b")
        .await
        .unwrap());
}

#[tokio::test]
async fn geocoder_failure_stores_without_coordinates() {
    let (articles, extractor) = three_sightings();
    let h = harness(FixedNews(articles), extractor, TableGeocoder::failing());

    let report = run_ingestion_batch(&h.ctx).await;
    assert_eq!(report.saved, 3);
    for row in h.store.list_all().await.unwrap() {
        assert_eq!((row.latitude, row.longitude), (None, None));
    }
}

#[tokio::test]
async fn missing_location_skips_geocoder_and_uses_placeholder_summary() {
    let articles = vec![article("https://www3.nhk.or.jp/news/a", T1, "2025-10-01T06:30:00Z")];
    let verdict = bear_sighting_api::analyze::SightingVerdict {
        is_sighting: true,
        prefecture: Some("秋田県".into()),
        city: None,
        summary: None,
    };
    let h = harness(
        FixedNews(articles),
        ScriptedExtractor::new().with(T1, verdict),
        TableGeocoder::new(),
    );

    let report = run_ingestion_batch(&h.ctx).await;
    assert_eq!(report.saved, 1);
    assert!(h.geocoder.seen.lock().unwrap().is_empty());

    let row = &h.store.list_all().await.unwrap()[0];
    assert_eq!(row.summary, NO_SUMMARY_PLACEHOLDER);
    assert_eq!(row.city, None);
    assert_eq!(row.latitude, None);
}

#[tokio::test]
async fn malformed_timestamp_drops_only_that_article() {
    let (mut articles, extractor) = three_sightings();
    articles[1].published_at = Some("2025/10/01 07:00".to_string());
    let h = harness(FixedNews(articles), extractor, TableGeocoder::new());

    let report = run_ingestion_batch(&h.ctx).await;
    assert_eq!(report.saved, 2);
    assert_eq!(report.skipped_for(SkipReason::BadTimestamp), 1);

    let urls: Vec<String> = h
        .store
        .list_all()
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.source_url)
        .collect();
    assert_eq!(
        urls,
        vec!["https://www3.nhk.or.jp/news/a", "https://www3.nhk.or.jp/news/c"]
    );
}

#[tokio::test]
async fn missing_timestamp_is_a_bad_timestamp() {
    let (mut articles, extractor) = three_sightings();
    articles[0].published_at = None;
    let h = harness(FixedNews(articles), extractor, TableGeocoder::new());

    let report = run_ingestion_batch(&h.ctx).await;
    assert_eq!(report.saved, 2);
    assert_eq!(report.skipped_for(SkipReason::BadTimestamp), 1);
}

#[tokio::test]
async fn articles_without_url_are_skipped() {
    let (mut articles, extractor) = three_sightings();
    articles[0].url = None;
    articles[2].url = Some("   ".to_string());
    let h = harness(FixedNews(articles), extractor, TableGeocoder::new());

    let report = run_ingestion_batch(&h.ctx).await;
    assert_eq!(report.saved, 1);
    assert_eq!(report.skipped_for(SkipReason::MissingUrl), 2);
    assert_eq!(h.extractor.call_count(), 1);
}

#[tokio::test]
async fn empty_fetch_and_provider_error_complete_with_zero() {
    let h = harness(FixedNews(vec![]), ScriptedExtractor::new(), TableGeocoder::new());
    let report = run_ingestion_batch(&h.ctx).await;
    assert_eq!((report.fetched, report.saved), (0, 0));

    let h = harness(FailingNews, ScriptedExtractor::new(), TableGeocoder::new());
    let report = run_ingestion_batch(&h.ctx).await;
    assert_eq!((report.fetched, report.saved), (0, 0));
    assert!(h.store.is_empty().await);
}

/// A store whose pre-check never sees existing rows, so the unique
/// constraint is what catches a duplicate (as under a concurrent run).
struct BlindPrecheck(MemorySightingStore);

#[async_trait]
impl SightingStore for BlindPrecheck {
    async fn exists_by_url(&self, _source_url: &str) -> Result<bool, StoreError> {
        Ok(false)
    }
    async fn insert(&self, new: NewSighting) -> Result<Sighting, StoreError> {
        self.0.insert(new).await
    }
    async fn list_all(&self) -> Result<Vec<Sighting>, StoreError> {
        self.0.list_all().await
    }
}

#[tokio::test]
async fn unique_violation_is_a_skip_not_an_abort() {
    let mut articles = vec![article("https://www3.nhk.or.jp/news/a", T1, "2025-10-01T06:30:00Z")];
    articles.push(articles[0].clone());
    articles.push(article("https://www3.nhk.or.jp/news/b", T2, "2025-10-01T07:00:00Z"));
    let extractor = ScriptedExtractor::new()
        .with(T1, sighting("秋田県", "秋田市", "s1"))
        .with(T2, sighting("岩手県", "盛岡市", "s2"));

    let store = Arc::new(BlindPrecheck(MemorySightingStore::new()));
    let ctx = AppContext::new(
        store.clone(),
        Arc::new(FixedNews(articles)),
        Arc::new(extractor),
        Arc::new(TableGeocoder::new()),
    );

    let report = run_ingestion_batch(&ctx).await;
    assert_eq!(report.saved, 2);
    assert_eq!(report.skipped_for(SkipReason::Duplicate), 1);
    assert_eq!(store.list_all().await.unwrap().len(), 2);
}

/// Lookup and insert failures are per-article.
struct BrokenStore;

#[async_trait]
impl SightingStore for BrokenStore {
    async fn exists_by_url(&self, source_url: &str) -> Result<bool, StoreError> {
        if source_url.ends_with("/a") {
            Err(StoreError::Database(sqlx::Error::PoolTimedOut))
        } else {
            Ok(false)
        }
    }
    async fn insert(&self, _new: NewSighting) -> Result<Sighting, StoreError> {
        Err(StoreError::Database(sqlx::Error::PoolClosed))
    }
    async fn list_all(&self) -> Result<Vec<Sighting>, StoreError> {
        Ok(vec![])
    }
}

#[tokio::test]
async fn storage_errors_do_not_abort_the_batch() {
    let (articles, extractor) = three_sightings();
    let extractor = Arc::new(extractor);
    let ctx = AppContext::new(
        Arc::new(BrokenStore),
        Arc::new(FixedNews(articles)),
        extractor.clone(),
        Arc::new(TableGeocoder::new()),
    );

    let report = run_ingestion_batch(&ctx).await;
    assert_eq!(report.saved, 0);
    assert_eq!(report.skipped_for(SkipReason::LookupFailed), 1);
    assert_eq!(report.skipped_for(SkipReason::StoreFailed), 2);
    assert_eq!(extractor.call_count(), 2);
}

//! Persister + deduplicator: the `bear_sightings` table behind a small trait,
//! with a PostgreSQL implementation and an in-process one.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tokio::sync::Mutex;

use crate::error::StoreError;
use crate::models::{NewSighting, Sighting};

#[async_trait]
pub trait SightingStore: Send + Sync {
    /// Exact match on the unique `source_url` column.
    async fn exists_by_url(&self, source_url: &str) -> Result<bool, StoreError>;

    /// Insert and return the stored row. A taken `source_url` is `StoreError::Duplicate`.
    async fn insert(&self, new: NewSighting) -> Result<Sighting, StoreError>;

    /// Every row, in insertion order.
    async fn list_all(&self) -> Result<Vec<Sighting>, StoreError>;

    /// Release pooled resources. Called once on shutdown.
    async fn close(&self) {}
}

// ---------------------------------------------------------------------------
// PostgreSQL
// ---------------------------------------------------------------------------

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS bear_sightings (
        id           BIGSERIAL PRIMARY KEY,
        prefecture   TEXT,
        city         TEXT,
        latitude     DOUBLE PRECISION,
        longitude    DOUBLE PRECISION,
        summary      TEXT NOT NULL,
        source_url   TEXT NOT NULL,
        image_url    TEXT,
        published_at TIMESTAMPTZ NOT NULL
    )
    "#,
    "CREATE UNIQUE INDEX IF NOT EXISTS ix_bear_sightings_source_url ON bear_sightings (source_url)",
    "CREATE INDEX IF NOT EXISTS ix_bear_sightings_prefecture ON bear_sightings (prefecture)",
    "CREATE INDEX IF NOT EXISTS ix_bear_sightings_city ON bear_sightings (city)",
    "CREATE INDEX IF NOT EXISTS ix_bear_sightings_published_at ON bear_sightings (published_at)",
];

const COLUMNS: &str =
    "id, prefecture, city, latitude, longitude, summary, source_url, image_url, published_at";

#[derive(Clone)]
pub struct PgSightingStore {
    pool: PgPool,
}

impl PgSightingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Create the table and its indexes if they do not exist yet.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        for stmt in SCHEMA {
            sqlx::query(stmt).execute(&self.pool).await?;
        }
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl SightingStore for PgSightingStore {
    async fn exists_by_url(&self, source_url: &str) -> Result<bool, StoreError> {
        let found: Option<(i64,)> =
            sqlx::query_as("SELECT id FROM bear_sightings WHERE source_url = $1 LIMIT 1")
                .bind(source_url)
                .fetch_optional(&self.pool)
                .await?;
        Ok(found.is_some())
    }

    async fn insert(&self, new: NewSighting) -> Result<Sighting, StoreError> {
        let sql = format!(
            r#"
            INSERT INTO bear_sightings
                (prefecture, city, latitude, longitude, summary, source_url, image_url, published_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (source_url) DO NOTHING
            RETURNING {COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, Sighting>(&sql)
            .bind(&new.prefecture)
            .bind(&new.city)
            .bind(new.latitude)
            .bind(new.longitude)
            .bind(&new.summary)
            .bind(&new.source_url)
            .bind(&new.image_url)
            .bind(new.published_at)
            .fetch_optional(&self.pool)
            .await?;

        row.ok_or(StoreError::Duplicate(new.source_url))
    }

    async fn list_all(&self) -> Result<Vec<Sighting>, StoreError> {
        let sql = format!("SELECT {COLUMNS} FROM bear_sightings ORDER BY id");
        let rows = sqlx::query_as::<_, Sighting>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

// ---------------------------------------------------------------------------
// In-process
// ---------------------------------------------------------------------------

/// Same contract as the Postgres store, kept in memory. Ids start at 1.
#[derive(Default)]
pub struct MemorySightingStore {
    rows: Mutex<Vec<Sighting>>,
}

impl MemorySightingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.rows.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl SightingStore for MemorySightingStore {
    async fn exists_by_url(&self, source_url: &str) -> Result<bool, StoreError> {
        let rows = self.rows.lock().await;
        Ok(rows.iter().any(|r| r.source_url == source_url))
    }

    async fn insert(&self, new: NewSighting) -> Result<Sighting, StoreError> {
        let mut rows = self.rows.lock().await;
        if rows.iter().any(|r| r.source_url == new.source_url) {
            return Err(StoreError::Duplicate(new.source_url));
        }
        let id = rows.last().map(|r| r.id + 1).unwrap_or(1);
        let stored = new.with_id(id);
        rows.push(stored.clone());
        Ok(stored)
    }

    async fn list_all(&self) -> Result<Vec<Sighting>, StoreError> {
        Ok(self.rows.lock().await.clone())
    }
}

//! The stored sighting row and the value handed to the persister.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One stored bear sighting, as returned by `GET /sightings`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Sighting {
    /// Generated on insert, never changed afterwards.
    pub id: i64,
    pub prefecture: Option<String>,
    pub city: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub summary: String,
    /// Unique across all rows (dedup key).
    pub source_url: String,
    pub image_url: Option<String>,
    pub published_at: DateTime<Utc>,
}

/// A fully assembled record that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSighting {
    pub prefecture: Option<String>,
    pub city: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub summary: String,
    pub source_url: String,
    pub image_url: Option<String>,
    pub published_at: DateTime<Utc>,
}

impl NewSighting {
    /// Attach the identifier assigned by the store.
    pub fn with_id(self, id: i64) -> Sighting {
        Sighting {
            id,
            prefecture: self.prefecture,
            city: self.city,
            latitude: self.latitude,
            longitude: self.longitude,
            summary: self.summary,
            source_url: self.source_url,
            image_url: self.image_url,
            published_at: self.published_at,
        }
    }
}

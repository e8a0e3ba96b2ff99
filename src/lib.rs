// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod analyze;
pub mod api;
pub mod config;
pub mod context;
pub mod error;
pub mod geocode;
pub mod ingest;
pub mod metrics;
pub mod models;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::api::router;
pub use crate::context::AppContext;
pub use crate::ingest::{run_ingestion_batch, BatchReport};
pub use crate::models::{NewSighting, Sighting};

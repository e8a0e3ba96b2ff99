use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use tower_http::cors::CorsLayer;

use crate::error::StoreError;
use crate::models::Sighting;
use crate::store::SightingStore;

pub const WELCOME_MESSAGE: &str = "Welcome to the Bear Sighting API!";

#[derive(Clone)]
pub struct AppState {
    store: Arc<dyn SightingStore>,
}

impl AppState {
    pub fn new(store: Arc<dyn SightingStore>) -> Self {
        Self { store }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/sightings", get(list_sightings))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

async fn root() -> Json<serde_json::Value> {
    Json(json!({ "message": WELCOME_MESSAGE }))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn list_sightings(State(state): State<AppState>) -> Result<Json<Vec<Sighting>>, ApiError> {
    let rows = state.store.list_all().await?;
    Ok(Json(rows))
}

pub struct ApiError(StoreError);

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self.0, "failed to list sightings");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "failed to load sightings" })),
        )
            .into_response()
    }
}

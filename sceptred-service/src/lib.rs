//! Sceptred Service Library
//!
//! HTTP handlers and routing for the elevation tile service.
//! This library is used by both the sceptred-service binary and integration tests.

pub mod handlers;

use std::sync::Arc;

use axum::{routing::get, Router};
use sceptred::TileService;

/// Application state shared across handlers.
pub struct AppState {
    /// Tile lookup service.
    pub tile_service: TileService,
}

/// Build the API routes over `state`.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/data/:grid_square", get(handlers::get_tile))
        .route("/health", get(handlers::health_check))
        .route("/stats", get(handlers::get_stats))
        .with_state(state)
}

// Re-export commonly used types for convenience
pub use handlers::{ErrorResponse, HealthResponse, StatsResponse, TileMetaResponse, TileResponse};

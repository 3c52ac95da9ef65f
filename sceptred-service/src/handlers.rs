//! HTTP request handlers for the tile service.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sceptred::{TerrainError, TileRecord};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::AppState;

/// Tile metadata.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TileMetaResponse {
    /// Meters between samples.
    pub square_size: u32,
    /// Uppercase grid reference.
    pub grid_reference: String,
}

/// A tile and its metadata.
///
/// `data` holds 200 rows of 200 elevations in meters, or is empty when no
/// survey data exists for the grid square.
#[derive(Debug, Serialize, ToSchema)]
pub struct TileResponse {
    pub meta: TileMetaResponse,
    pub data: Vec<Vec<i16>>,
}

impl From<TileRecord> for TileResponse {
    fn from(record: TileRecord) -> Self {
        Self {
            meta: TileMetaResponse {
                square_size: record.meta.square_size,
                grid_reference: record.meta.grid_reference,
            },
            data: record.data,
        }
    }
}

/// Error response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Error message.
    pub error: String,
}

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
    /// Service version.
    pub version: String,
}

/// Store and cache statistics response.
#[derive(Debug, Serialize, ToSchema)]
pub struct StatsResponse {
    /// Number of tiles in the store.
    pub stored_tiles: usize,
    /// Number of tiles in cache.
    pub cached_tiles: u64,
    /// Cache hit count.
    pub cache_hits: u64,
    /// Cache miss count.
    pub cache_misses: u64,
    /// Cache hit rate (0.0 to 1.0).
    pub hit_rate: f64,
}

/// Get the elevation tile for a grid square.
///
/// # Returns
///
/// - `200 OK` with the tile, or with empty `data` if nothing is stored
/// - `400 Bad Request` if the grid square is not two letters and two digits
/// - `500 Internal Server Error` if the stored tile is corrupt or unreadable
#[utoipa::path(
    get,
    path = "/data/{grid_square}",
    tag = "tiles",
    params(
        ("grid_square" = String, Path, description = "Grid reference, e.g. NT27 (case-insensitive)")
    ),
    responses(
        (status = 200, description = "Tile found, or empty tile", body = TileResponse),
        (status = 400, description = "Invalid grid reference", body = ErrorResponse),
        (status = 500, description = "Corrupt or unreadable tile", body = ErrorResponse)
    )
)]
pub async fn get_tile(
    State(state): State<Arc<AppState>>,
    Path(grid_square): Path<String>,
) -> Response {
    tracing::debug!(grid_square = %grid_square, "Tile query");

    match state.tile_service.lookup(&grid_square) {
        Ok(record) => {
            tracing::info!(
                grid_reference = %record.meta.grid_reference,
                empty = record.is_empty(),
                "Tile served"
            );
            (StatusCode::OK, Json(TileResponse::from(record))).into_response()
        }
        Err(e) => error_response(&grid_square, e),
    }
}

/// Create an error response for tile queries.
fn error_response(grid_square: &str, e: TerrainError) -> Response {
    let status = match &e {
        TerrainError::InvalidReference { .. } => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status.is_server_error() {
        tracing::error!(grid_square = grid_square, error = %e, "Tile query failed");
    } else {
        tracing::warn!(grid_square = grid_square, error = %e, "Tile query rejected");
    }

    (
        status,
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
        .into_response()
}

/// Health check endpoint.
///
/// Returns service status and version.
#[utoipa::path(
    get,
    path = "/health",
    tag = "system",
    responses((status = 200, description = "Service is healthy", body = HealthResponse))
)]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Get store and cache statistics.
#[utoipa::path(
    get,
    path = "/stats",
    tag = "system",
    responses(
        (status = 200, description = "Statistics", body = StatsResponse),
        (status = 500, description = "Store could not be listed", body = ErrorResponse)
    )
)]
pub async fn get_stats(State(state): State<Arc<AppState>>) -> Response {
    let stored_tiles = match state.tile_service.references() {
        Ok(references) => references.len(),
        Err(e) => return error_response("*", e),
    };
    let stats = state.tile_service.cache_stats();

    Json(StatsResponse {
        stored_tiles,
        cached_tiles: stats.entry_count,
        cache_hits: stats.hit_count,
        cache_misses: stats.miss_count,
        hit_rate: stats.hit_rate(),
    })
    .into_response()
}

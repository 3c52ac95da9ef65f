//! Sceptred Service - HTTP microservice for elevation tiles.
//!
//! Serves tiles written by `sceptred ingest` as JSON.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `SCEPTRED_DB_DIR` | Directory of stored tiles | `./db` |
//! | `SCEPTRED_CACHE_SIZE` | Maximum decoded tiles in cache | 100 |
//! | `SCEPTRED_PORT` | HTTP server port | 8000 |
//! | `RUST_LOG` | Log level (e.g., "info", "debug") | "info" |
//!
//! ## Endpoints
//!
//! - `GET /data/{grid_square}` - Tile for a grid square, e.g. `/data/NT27`
//! - `GET /health` - Health check
//! - `GET /stats` - Store and cache statistics
//! - `GET /docs` - OpenAPI documentation (Swagger UI)

use std::net::SocketAddr;
use std::sync::Arc;

use sceptred::TileServiceBuilder;
use sceptred_service::{handlers, router, AppState};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// OpenAPI documentation for the tile service.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Sceptred Tile Service",
        version = "0.1.0",
        description = "Read-only REST API serving 200x200 elevation tiles by OS grid reference.",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    paths(handlers::get_tile, handlers::health_check, handlers::get_stats),
    components(schemas(
        handlers::TileResponse,
        handlers::TileMetaResponse,
        handlers::ErrorResponse,
        handlers::HealthResponse,
        handlers::StatsResponse,
    )),
    tags(
        (name = "tiles", description = "Elevation tile endpoints"),
        (name = "system", description = "System and health endpoints")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sceptred=info,sceptred_service=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let port: u16 = std::env::var("SCEPTRED_PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(8000);

    let builder = match TileServiceBuilder::from_env() {
        Ok(builder) => builder,
        Err(_) => {
            tracing::warn!("SCEPTRED_DB_DIR not set, using ./db");
            TileServiceBuilder::new("./db")
        }
    };
    let db_dir = builder.get_db_dir().to_path_buf();
    let tile_service = builder.build()?;

    tracing::info!(
        db_dir = %db_dir.display(),
        cache_capacity = tile_service.cache_capacity(),
        port = port,
        "Starting Sceptred service"
    );

    let state = Arc::new(AppState { tile_service });

    let app = router(state)
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(
            ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            ),
        );

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("Listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

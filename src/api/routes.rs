use axum::{http::StatusCode, routing::get, Json, Router};
use std::path::Path;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::{api::dto::*, config::Config};

pub const PLACEHOLDER_MESSAGE: &str = "WhatsApp Manager API funcionando correctamente";

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

pub async fn placeholder() -> Json<PlaceholderResponse> {
    Json(PlaceholderResponse {
        message: PLACEHOLDER_MESSAGE.to_string(),
    })
}

pub async fn not_found() -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: "Not found".to_string(),
            code: 404,
        }),
    )
}

/// Health check plus either the built dashboard (production) or a JSON
/// placeholder. Business data never passes through this server.
pub fn create_router(state: AppState) -> Router {
    let config = state.config.clone();

    let router = Router::new().route("/api/health", get(health));

    let router = if config.is_production() {
        let static_dir = Path::new(&config.static_dir);
        // Unknown paths fall through to the SPA entry point.
        let spa = ServeDir::new(static_dir)
            .fallback(ServeFile::new(static_dir.join("index.html")));
        router.fallback_service(spa)
    } else {
        router.route("/", get(placeholder)).fallback(not_found)
    };

    let router = router.layer(TraceLayer::new_for_http());

    if config.cors_enabled {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}

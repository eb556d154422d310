pub mod routes;

use crate::state::AppState;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};

pub fn router(state: Arc<AppState>) -> Router {
    let static_dir = state.config.static_dir.clone();

    Router::new()
        .route("/api/predict", post(routes::predict))
        .route("/api/features/parse", post(routes::parse_features))
        .route("/api/features/template", get(routes::get_template))
        .route("/api/results", get(routes::get_results))
        .route("/api/results/all", get(routes::get_all_results))
        .route("/api/stats", get(routes::get_stats))
        .route("/api/comparison", get(routes::get_comparison))
        .route("/api/distribution", get(routes::get_distribution))
        .route("/api/ground-truth", get(routes::get_ground_truth))
        .route("/api/ablation", get(routes::get_ablation))
        .route("/api/cache/clear", post(routes::clear_cache))
        .route("/api/counters", get(routes::get_counters))
        .fallback_service(
            ServeDir::new(&static_dir).fallback(ServeFile::new(static_dir.join("index.html"))),
        )
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

use axum::{http::StatusCode, response::IntoResponse, routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::api;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let prefix = state.config().prefix.clone();

    let public_routes = Router::<AppState>::new()
        .route("/health", get(health_check))
        .route("/healthz", get(health_check))
        .route("/version", get(version_info));

    api::session_router(&prefix)
        .nest("/api", api::router())
        .merge(public_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::very_permissive())
}

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, axum::Json(serde_json::json!({"status": "ok"})))
}

async fn version_info() -> impl IntoResponse {
    (
        StatusCode::OK,
        axum::Json(serde_json::json!({
            "cargo_version": env!("CARGO_PKG_VERSION"),
        })),
    )
}

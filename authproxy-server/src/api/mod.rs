//! API Routes
//!
//! Login session routes live under the configured prefix; operational
//! endpoints live under `/api`.

mod error;
pub mod session;

#[cfg(test)]
mod session_tests;

pub use error::ApiError;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde::Serialize;

use authproxy_core::BrokerStats;

use crate::state::AppState;

/// Routes for the login flow, mounted at `{prefix}/auth`, `/poll`, `/complete`.
pub fn session_router(prefix: &str) -> Router<AppState> {
    Router::new()
        .route(
            &format!("{prefix}/auth"),
            get(session::poll_session)
                .post(session::start_session)
                .put(session::start_session)
                .fallback(session::unsupported_method),
        )
        .route(&format!("{prefix}/poll"), get(session::poll_session))
        .route(&format!("{prefix}/complete"), get(session::complete_session))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/status", get(get_status))
        // API fallback: return 404 for unknown API endpoints
        .fallback(api_not_found)
}

async fn api_not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(serde_json::json!({"error": "Not found"})))
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub version: String,
    pub broker_running: bool,
    #[serde(flatten)]
    pub stats: BrokerStats,
}

pub async fn get_status(State(state): State<AppState>) -> Result<Json<StatusResponse>, ApiError> {
    let stats = state.broker().stats().await?;
    Ok(Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        broker_running: !state.broker().is_closed(),
        stats,
    }))
}

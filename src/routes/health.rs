use axum::{extract::State, response::IntoResponse};
use serde::Serialize;

use crate::{AppState, utils::success_to_api_response};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub cache_enabled: bool,
    pub rate_limit_enabled: bool,
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    success_to_api_response(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        cache_enabled: state.user_cache.is_some(),
        rate_limit_enabled: state.limiter.is_some(),
    })
}

//! Root and health endpoints.

use crate::state::AppState;
use axum::{extract::State, Json};
use kbase::types::now_ts;
use serde::Serialize;

#[derive(Debug, Serialize, serde::Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub database: String,
}

pub async fn root() -> &'static str {
    "kbase server is running."
}

/// `GET /api/health`. Always 200; the `database` field reports whether a
/// trivial query succeeded.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = if state.kb.catalog.ping().await {
        "connected"
    } else {
        "disconnected"
    };
    Json(HealthResponse {
        status: "ok".to_string(),
        timestamp: now_ts(),
        database: database.to_string(),
    })
}

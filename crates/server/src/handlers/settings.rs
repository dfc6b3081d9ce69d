use crate::{
    auth::{Admins, Authorized},
    errors::{AppError, JsonBody},
    state::AppState,
};
use axum::{
    extract::{Path, State},
    Json,
};
use kbase::settings::{Setting, SettingInput};

pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<Setting>>, AppError> {
    Ok(Json(state.kb.settings.list().await?))
}

pub async fn get(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<Setting>, AppError> {
    Ok(Json(state.kb.settings.get(&key).await?))
}

/// Creates the setting if it does not exist yet.
pub async fn upsert(
    State(state): State<AppState>,
    auth: Authorized<Admins>,
    Path(key): Path<String>,
    JsonBody(input): JsonBody<SettingInput>,
) -> Result<Json<Setting>, AppError> {
    Ok(Json(state.kb.settings.upsert(&key, input, &auth.actor()).await?))
}

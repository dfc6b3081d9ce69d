use crate::{
    auth::{Admins, Authorized, Contributors},
    errors::AppError,
    state::AppState,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use kbase::versions::{PageVersion, RestoreOutcome};

pub async fn snapshot(
    State(state): State<AppState>,
    auth: Authorized<Contributors>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<PageVersion>), AppError> {
    let version = state.kb.versions.snapshot(&id, &auth.actor()).await?;
    Ok((StatusCode::CREATED, Json(version)))
}

pub async fn list(
    State(state): State<AppState>,
    _auth: Authorized<Contributors>,
    Path(id): Path<String>,
) -> Result<Json<Vec<PageVersion>>, AppError> {
    Ok(Json(state.kb.versions.list(&id).await?))
}

pub async fn get(
    State(state): State<AppState>,
    _auth: Authorized<Contributors>,
    Path((id, version_id)): Path<(String, String)>,
) -> Result<Json<PageVersion>, AppError> {
    Ok(Json(state.kb.versions.get(&id, &version_id).await?))
}

pub async fn restore(
    State(state): State<AppState>,
    auth: Authorized<Admins>,
    Path((id, version_id)): Path<(String, String)>,
) -> Result<Json<RestoreOutcome>, AppError> {
    Ok(Json(
        state
            .kb
            .versions
            .restore(&id, &version_id, &auth.actor())
            .await?,
    ))
}

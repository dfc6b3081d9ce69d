use crate::{
    auth::{Admins, Authorized, Contributors},
    errors::{AppError, JsonBody},
    state::AppState,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use kbase::templates::{PageTemplate, TemplateInput};

pub async fn list(
    State(state): State<AppState>,
    _auth: Authorized<Contributors>,
) -> Result<Json<Vec<PageTemplate>>, AppError> {
    Ok(Json(state.kb.templates.list().await?))
}

pub async fn get(
    State(state): State<AppState>,
    _auth: Authorized<Contributors>,
    Path(id): Path<String>,
) -> Result<Json<PageTemplate>, AppError> {
    Ok(Json(state.kb.templates.get(&id).await?))
}

pub async fn create(
    State(state): State<AppState>,
    auth: Authorized<Admins>,
    JsonBody(input): JsonBody<TemplateInput>,
) -> Result<(StatusCode, Json<PageTemplate>), AppError> {
    let template = state.kb.templates.create(input, &auth.actor()).await?;
    Ok((StatusCode::CREATED, Json(template)))
}

/// Replaces name, description and module list.
pub async fn update(
    State(state): State<AppState>,
    auth: Authorized<Admins>,
    Path(id): Path<String>,
    JsonBody(input): JsonBody<TemplateInput>,
) -> Result<Json<PageTemplate>, AppError> {
    Ok(Json(state.kb.templates.update(&id, input, &auth.actor()).await?))
}

pub async fn delete(
    State(state): State<AppState>,
    auth: Authorized<Admins>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.kb.templates.delete(&id, &auth.actor()).await?;
    Ok(StatusCode::NO_CONTENT)
}

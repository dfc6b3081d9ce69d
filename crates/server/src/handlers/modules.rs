use super::ReorderRequest;
use crate::{
    auth::{Authorized, Contributors},
    errors::{AppError, JsonBody},
    state::AppState,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use kbase::modules::{Module, ModuleUpdate, NewModule};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleQuery {
    pub page_id: String,
}

/// `GET /api/modules?pageId=` lists a page's live modules in order.
pub async fn list(
    State(state): State<AppState>,
    _auth: Authorized<Contributors>,
    Query(query): Query<ModuleQuery>,
) -> Result<Json<Vec<Module>>, AppError> {
    Ok(Json(state.kb.modules.list(&query.page_id).await?))
}

pub async fn get(
    State(state): State<AppState>,
    _auth: Authorized<Contributors>,
    Path(id): Path<String>,
) -> Result<Json<Module>, AppError> {
    Ok(Json(state.kb.modules.get(&id).await?))
}

pub async fn create(
    State(state): State<AppState>,
    auth: Authorized<Contributors>,
    JsonBody(input): JsonBody<NewModule>,
) -> Result<(StatusCode, Json<Module>), AppError> {
    let module = state.kb.modules.create(input, &auth.actor()).await?;
    Ok((StatusCode::CREATED, Json(module)))
}

pub async fn update(
    State(state): State<AppState>,
    auth: Authorized<Contributors>,
    Path(id): Path<String>,
    JsonBody(patch): JsonBody<ModuleUpdate>,
) -> Result<Json<Module>, AppError> {
    Ok(Json(state.kb.modules.update(&id, patch, &auth.actor()).await?))
}

pub async fn delete(
    State(state): State<AppState>,
    auth: Authorized<Contributors>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.kb.modules.delete(&id, &auth.actor()).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn reorder(
    State(state): State<AppState>,
    auth: Authorized<Contributors>,
    Path(page_id): Path<String>,
    JsonBody(body): JsonBody<ReorderRequest>,
) -> Result<Json<Vec<Module>>, AppError> {
    Ok(Json(
        state
            .kb
            .modules
            .reorder(&page_id, &body.ordered_ids, &auth.actor())
            .await?,
    ))
}

//! Page CRUD, workflow actions and trash.
//!
//! Authoring (create, edit, trash, submit for review) needs a contributor
//! role; publishing decisions and anything irreversible need an admin.

use crate::{
    auth::{Admins, Authorized, Contributors},
    errors::{AppError, JsonBody},
    state::AppState,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use kbase::{
    pages::{NewPage, PageDetail, PageFilter, PageListItem, PageUpdate},
    WorkflowAction,
};

pub async fn list(
    State(state): State<AppState>,
    _auth: Authorized<Contributors>,
    Query(filter): Query<PageFilter>,
) -> Result<Json<Vec<PageListItem>>, AppError> {
    Ok(Json(state.kb.pages.list(&filter).await?))
}

pub async fn get(
    State(state): State<AppState>,
    _auth: Authorized<Contributors>,
    Path(id): Path<String>,
) -> Result<Json<PageDetail>, AppError> {
    Ok(Json(state.kb.pages.get(&id).await?))
}

pub async fn get_by_slug(
    State(state): State<AppState>,
    _auth: Authorized<Contributors>,
    Path(slug): Path<String>,
) -> Result<Json<PageDetail>, AppError> {
    Ok(Json(state.kb.pages.get_by_slug(&slug).await?))
}

pub async fn create(
    State(state): State<AppState>,
    auth: Authorized<Contributors>,
    JsonBody(input): JsonBody<NewPage>,
) -> Result<(StatusCode, Json<PageDetail>), AppError> {
    let page = state.kb.pages.create(input, &auth.actor()).await?;
    Ok((StatusCode::CREATED, Json(page)))
}

pub async fn update(
    State(state): State<AppState>,
    auth: Authorized<Contributors>,
    Path(id): Path<String>,
    JsonBody(patch): JsonBody<PageUpdate>,
) -> Result<Json<PageDetail>, AppError> {
    Ok(Json(state.kb.pages.update(&id, patch, &auth.actor()).await?))
}

/// `DELETE /api/pages/{id}` moves the page to the trash.
pub async fn trash(
    State(state): State<AppState>,
    auth: Authorized<Contributors>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.kb.pages.trash(&id, &auth.actor()).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn submit_review(
    State(state): State<AppState>,
    auth: Authorized<Contributors>,
    Path(id): Path<String>,
) -> Result<Json<PageDetail>, AppError> {
    let page = state
        .kb
        .pages
        .transition(&id, WorkflowAction::SubmitForReview, &auth.actor())
        .await?;
    Ok(Json(page))
}

async fn admin_transition(
    state: &AppState,
    auth: &Authorized<Admins>,
    id: &str,
    action: WorkflowAction,
) -> Result<Json<PageDetail>, AppError> {
    Ok(Json(
        state.kb.pages.transition(id, action, &auth.actor()).await?,
    ))
}

pub async fn publish(
    State(state): State<AppState>,
    auth: Authorized<Admins>,
    Path(id): Path<String>,
) -> Result<Json<PageDetail>, AppError> {
    admin_transition(&state, &auth, &id, WorkflowAction::Publish).await
}

pub async fn archive(
    State(state): State<AppState>,
    auth: Authorized<Admins>,
    Path(id): Path<String>,
) -> Result<Json<PageDetail>, AppError> {
    admin_transition(&state, &auth, &id, WorkflowAction::Archive).await
}

pub async fn approve(
    State(state): State<AppState>,
    auth: Authorized<Admins>,
    Path(id): Path<String>,
) -> Result<Json<PageDetail>, AppError> {
    admin_transition(&state, &auth, &id, WorkflowAction::Approve).await
}

pub async fn reject(
    State(state): State<AppState>,
    auth: Authorized<Admins>,
    Path(id): Path<String>,
) -> Result<Json<PageDetail>, AppError> {
    admin_transition(&state, &auth, &id, WorkflowAction::Reject).await
}

pub async fn list_trashed(
    State(state): State<AppState>,
    _auth: Authorized<Admins>,
) -> Result<Json<Vec<PageListItem>>, AppError> {
    Ok(Json(state.kb.pages.list_trashed().await?))
}

pub async fn restore(
    State(state): State<AppState>,
    auth: Authorized<Admins>,
    Path(id): Path<String>,
) -> Result<Json<PageDetail>, AppError> {
    Ok(Json(state.kb.pages.restore(&id, &auth.actor()).await?))
}

pub async fn permanent_delete(
    State(state): State<AppState>,
    auth: Authorized<Admins>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.kb.pages.permanent_delete(&id, &auth.actor()).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn duplicate(
    State(state): State<AppState>,
    auth: Authorized<Contributors>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<PageDetail>), AppError> {
    let copy = state.kb.pages.duplicate(&id, &auth.actor()).await?;
    Ok((StatusCode::CREATED, Json(copy)))
}

use super::ReorderRequest;
use crate::{
    auth::{Admins, Authorized, MaybeUser},
    errors::{AppError, JsonBody},
    state::AppState,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use core_access::{has_any_role, ADMIN_ROLES};
use kbase::sections::{
    NewSection, PublishedSection, Section, SectionNode, SectionUpdate, SectionWithPages,
};

pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<SectionWithPages>>, AppError> {
    Ok(Json(state.kb.sections.list().await?))
}

/// The navigation tree as the caller may see it: admins see every section,
/// everyone else only visible ones whose role restriction they satisfy.
pub async fn tree(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
) -> Result<Json<Vec<SectionNode>>, AppError> {
    let roles = user
        .map(|u| u.claims.roles)
        .unwrap_or_default();
    let see_all = has_any_role(&roles, ADMIN_ROLES);
    Ok(Json(state.kb.sections.tree(&roles, see_all).await?))
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SectionWithPages>, AppError> {
    Ok(Json(state.kb.sections.get(&id).await?))
}

pub async fn get_by_slug(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<PublishedSection>, AppError> {
    Ok(Json(state.kb.sections.get_published_by_slug(&slug).await?))
}

pub async fn create(
    State(state): State<AppState>,
    auth: Authorized<Admins>,
    JsonBody(input): JsonBody<NewSection>,
) -> Result<(StatusCode, Json<Section>), AppError> {
    let section = state.kb.sections.create(input, &auth.actor()).await?;
    Ok((StatusCode::CREATED, Json(section)))
}

pub async fn update(
    State(state): State<AppState>,
    auth: Authorized<Admins>,
    Path(id): Path<String>,
    JsonBody(patch): JsonBody<SectionUpdate>,
) -> Result<Json<Section>, AppError> {
    Ok(Json(state.kb.sections.update(&id, patch, &auth.actor()).await?))
}

pub async fn delete(
    State(state): State<AppState>,
    auth: Authorized<Admins>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.kb.sections.delete(&id, &auth.actor()).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn reorder(
    State(state): State<AppState>,
    auth: Authorized<Admins>,
    JsonBody(body): JsonBody<ReorderRequest>,
) -> Result<Json<Vec<SectionWithPages>>, AppError> {
    Ok(Json(
        state
            .kb
            .sections
            .reorder(&body.ordered_ids, &auth.actor())
            .await?,
    ))
}

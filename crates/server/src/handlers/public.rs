//! The unauthenticated reader API. Only published pages that are not in
//! the trash are ever returned.

use crate::{errors::AppError, state::AppState};
use axum::{
    extract::{Path, Query, State},
    Json,
};
use kbase::{
    pages::{PageDetail, PageListItem},
    sections::PublishedSection,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

pub async fn published(State(state): State<AppState>) -> Result<Json<Vec<PageListItem>>, AppError> {
    Ok(Json(state.kb.catalog.published().await?))
}

pub async fn recent(State(state): State<AppState>) -> Result<Json<Vec<PageListItem>>, AppError> {
    Ok(Json(state.kb.catalog.recent().await?))
}

/// Counts a view.
pub async fn page(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<PageDetail>, AppError> {
    Ok(Json(state.kb.catalog.page_by_slug(&slug).await?))
}

pub async fn section(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<PublishedSection>, AppError> {
    Ok(Json(state.kb.catalog.section_by_slug(&slug).await?))
}

pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<PageListItem>>, AppError> {
    Ok(Json(state.kb.catalog.search(&query.q).await?))
}

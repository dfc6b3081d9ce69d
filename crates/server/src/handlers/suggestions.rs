use crate::{
    auth::{Admins, AuthenticatedUser, Authorized},
    errors::{AppError, JsonBody},
    state::AppState,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use kbase::suggestions::{NewSuggestion, Suggestion, SuggestionUpdate};

/// Any signed-in user may leave a suggestion.
pub async fn create(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    JsonBody(input): JsonBody<NewSuggestion>,
) -> Result<(StatusCode, Json<Suggestion>), AppError> {
    let suggestion = state.kb.suggestions.create(input, &user.actor()).await?;
    Ok((StatusCode::CREATED, Json(suggestion)))
}

pub async fn list(
    State(state): State<AppState>,
    _auth: Authorized<Admins>,
) -> Result<Json<Vec<Suggestion>>, AppError> {
    Ok(Json(state.kb.suggestions.list().await?))
}

pub async fn get(
    State(state): State<AppState>,
    _auth: Authorized<Admins>,
    Path(id): Path<String>,
) -> Result<Json<Suggestion>, AppError> {
    Ok(Json(state.kb.suggestions.get(&id).await?))
}

pub async fn update(
    State(state): State<AppState>,
    auth: Authorized<Admins>,
    Path(id): Path<String>,
    JsonBody(patch): JsonBody<SuggestionUpdate>,
) -> Result<Json<Suggestion>, AppError> {
    Ok(Json(state.kb.suggestions.update(&id, patch, &auth.actor()).await?))
}

pub async fn delete(
    State(state): State<AppState>,
    auth: Authorized<Admins>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.kb.suggestions.delete(&id, &auth.actor()).await?;
    Ok(StatusCode::NO_CONTENT)
}

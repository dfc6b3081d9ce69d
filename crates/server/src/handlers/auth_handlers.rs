//! Login, self-registration and the caller's own profile.

use crate::{
    auth::{issue_token, AuthenticatedUser},
    errors::{AppError, JsonBody},
    state::AppState,
};
use axum::{extract::State, http::StatusCode, Json};
use core_access::User;
use kbase::activity::{ActivityAction, ActivityEvent, EntityType};
use kbase::types::Actor;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub user: User,
}

pub async fn login(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let user = core_access::authenticate(state.db(), &body.email, &body.password).await?;
    let access_token = issue_token(&state.config, &user)?;
    info!(user_id = %user.id, "User logged in");
    Ok(Json(AuthResponse { access_token, user }))
}

/// Creates an account and logs it in. The first account becomes
/// `super_admin`.
pub async fn register(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let user = {
        let _write = state.kb.db.exclusive().await;
        core_access::register(
            state.db(),
            &body.email,
            &body.password,
            body.name.as_deref(),
            state.config.bcrypt_cost,
        )
        .await?
    };
    state.recorder.record(ActivityEvent::new(
        &Actor::user(&user.id),
        ActivityAction::Registered,
        EntityType::User,
        &user.id,
    ));
    let access_token = issue_token(&state.config, &user)?;
    Ok((StatusCode::CREATED, Json(AuthResponse { access_token, user })))
}

pub async fn me(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<User>, AppError> {
    Ok(Json(core_access::find_user(state.db(), user.id()).await?))
}

//! User administration. Every route here needs an admin role.
//!
//! Accounts live in `core_access`, which writes through its own
//! connections; each write holds the provider's write lock so it queues
//! behind other writers instead of hitting a busy database.

use crate::{
    auth::{Admins, Authorized},
    errors::{AppError, JsonBody},
    state::AppState,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use core_access::{User, UserStatus, UserUpdate};
use kbase::activity::{ActivityAction, ActivityEvent, EntityType};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AssignRoleRequest {
    pub role: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReplaceRolesRequest {
    pub roles: Vec<String>,
}

fn log(state: &AppState, auth: &Authorized<Admins>, action: ActivityAction, user: &User) {
    state.recorder.record(ActivityEvent::new(
        &auth.actor(),
        action,
        EntityType::User,
        &user.id,
    ));
}

pub async fn list(
    State(state): State<AppState>,
    _auth: Authorized<Admins>,
) -> Result<Json<Vec<User>>, AppError> {
    Ok(Json(core_access::list_users(state.db()).await?))
}

pub async fn get(
    State(state): State<AppState>,
    _auth: Authorized<Admins>,
    Path(id): Path<String>,
) -> Result<Json<User>, AppError> {
    Ok(Json(core_access::find_user(state.db(), &id).await?))
}

pub async fn create(
    State(state): State<AppState>,
    auth: Authorized<Admins>,
    JsonBody(input): JsonBody<core_access::NewUser>,
) -> Result<(StatusCode, Json<User>), AppError> {
    let user = {
        let _write = state.kb.db.exclusive().await;
        core_access::create_user(state.db(), input, state.config.bcrypt_cost).await?
    };
    log(&state, &auth, ActivityAction::Created, &user);
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn update(
    State(state): State<AppState>,
    auth: Authorized<Admins>,
    Path(id): Path<String>,
    JsonBody(patch): JsonBody<UserUpdate>,
) -> Result<Json<User>, AppError> {
    let user = {
        let _write = state.kb.db.exclusive().await;
        core_access::update_user(state.db(), &id, patch).await?
    };
    log(&state, &auth, ActivityAction::Updated, &user);
    Ok(Json(user))
}

/// `PATCH /api/users/{id}/roles` adds one role.
pub async fn assign_role(
    State(state): State<AppState>,
    auth: Authorized<Admins>,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<AssignRoleRequest>,
) -> Result<Json<User>, AppError> {
    let user = {
        let _write = state.kb.db.exclusive().await;
        core_access::assign_role(state.db(), &id, &body.role).await?
    };
    log(&state, &auth, ActivityAction::RoleAssigned, &user);
    Ok(Json(user))
}

/// `PUT /api/users/{id}/roles` replaces the whole role set.
pub async fn replace_roles(
    State(state): State<AppState>,
    auth: Authorized<Admins>,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<ReplaceRolesRequest>,
) -> Result<Json<User>, AppError> {
    let user = {
        let _write = state.kb.db.exclusive().await;
        core_access::replace_roles(state.db(), &id, &body.roles).await?
    };
    log(&state, &auth, ActivityAction::RoleAssigned, &user);
    Ok(Json(user))
}

pub async fn remove_role(
    State(state): State<AppState>,
    auth: Authorized<Admins>,
    Path((id, role)): Path<(String, String)>,
) -> Result<Json<User>, AppError> {
    let user = {
        let _write = state.kb.db.exclusive().await;
        core_access::remove_role(state.db(), &id, &role).await?
    };
    log(&state, &auth, ActivityAction::RoleRemoved, &user);
    Ok(Json(user))
}

async fn change_status(
    state: &AppState,
    auth: &Authorized<Admins>,
    id: &str,
    status: UserStatus,
) -> Result<Json<User>, AppError> {
    let user = {
        let _write = state.kb.db.exclusive().await;
        core_access::set_status(state.db(), id, status).await?
    };
    let action = match status {
        UserStatus::Active => ActivityAction::Activated,
        UserStatus::Inactive => ActivityAction::Deactivated,
    };
    log(state, auth, action, &user);
    Ok(Json(user))
}

pub async fn activate(
    State(state): State<AppState>,
    auth: Authorized<Admins>,
    Path(id): Path<String>,
) -> Result<Json<User>, AppError> {
    change_status(&state, &auth, &id, UserStatus::Active).await
}

pub async fn deactivate(
    State(state): State<AppState>,
    auth: Authorized<Admins>,
    Path(id): Path<String>,
) -> Result<Json<User>, AppError> {
    change_status(&state, &auth, &id, UserStatus::Inactive).await
}

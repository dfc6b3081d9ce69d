use crate::{
    auth::{Admins, Authorized},
    errors::AppError,
    state::AppState,
};
use axum::{
    extract::{Query, State},
    Json,
};
use kbase::activity::{ActivityFilter, ActivityLogEntry, AuditLogEntry};

/// `GET /api/activity?userId=&entityType=&limit=`
pub async fn list(
    State(state): State<AppState>,
    _auth: Authorized<Admins>,
    Query(filter): Query<ActivityFilter>,
) -> Result<Json<Vec<ActivityLogEntry>>, AppError> {
    Ok(Json(state.kb.activity.list(&filter).await?))
}

pub async fn list_audit(
    State(state): State<AppState>,
    _auth: Authorized<Admins>,
    Query(filter): Query<ActivityFilter>,
) -> Result<Json<Vec<AuditLogEntry>>, AppError> {
    Ok(Json(state.kb.activity.list_audit(&filter).await?))
}

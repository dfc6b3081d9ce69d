use axum::{
    extract::{rejection::JsonRejection, FromRequest},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use core_access::CoreAccessError;
use kbase::KbError;
use serde_json::json;
use tracing::{error, warn};

/// Every error a handler can return, mapped onto an HTTP status.
///
/// Internal failures are logged in full and reported to the client with a
/// generic message.
#[derive(Debug)]
pub enum AppError {
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    BadRequest(String),
    Internal(anyhow::Error),
}

impl From<KbError> for AppError {
    fn from(err: KbError) -> Self {
        match err {
            KbError::NotFound(msg) => AppError::NotFound(msg),
            KbError::Conflict(msg) => AppError::Conflict(msg),
            KbError::BadRequest(msg) => AppError::BadRequest(msg),
            e @ KbError::InvalidTransition { .. } => AppError::Conflict(e.to_string()),
            other => AppError::Internal(other.into()),
        }
    }
}

impl From<CoreAccessError> for AppError {
    fn from(err: CoreAccessError) -> Self {
        match err {
            CoreAccessError::NotFound(msg) => AppError::NotFound(msg),
            CoreAccessError::Conflict(msg) => AppError::Conflict(msg),
            CoreAccessError::Validation(msg) => AppError::BadRequest(msg),
            CoreAccessError::InvalidCredentials => {
                AppError::Unauthorized("Invalid email or password".to_string())
            }
            other => AppError::Internal(other.into()),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Unauthorized(msg) => {
                warn!("Rejected request: {msg}");
                (StatusCode::UNAUTHORIZED, msg)
            }
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Internal(err) => {
                error!("Internal server error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal server error occurred.".to_string(),
                )
            }
        };
        (status, Json(json!({ "message": message }))).into_response()
    }
}

/// `axum::Json` with malformed or unknown-field bodies reported as a 400
/// `{"message": ...}` instead of axum's plain-text rejection.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct JsonBody<T>(pub T);

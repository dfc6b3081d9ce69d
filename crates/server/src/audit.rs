//! # Audit Middleware
//!
//! Every successful mutating request (`POST`, `PUT`, `PATCH`, `DELETE` with a
//! 2xx response) is recorded as an [`AuditEvent`]: the route template, the
//! path and query parameters as `before`, and the JSON response as `after`.
//! Events go through the shared recorder, so a slow or failing log write
//! never affects the response.

use axum::{
    body::{to_bytes, Body},
    extract::{FromRequestParts, MatchedPath, Query, RawPathParams, Request, State},
    http::Method,
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use kbase::activity::AuditEvent;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use tracing::warn;

use crate::{auth::middleware::bearer_claims, state::AppState};

fn is_mutation(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

/// `"/api/pages/{id}/publish"` -> `"pages"`.
pub fn entity_type_of(route: &str) -> String {
    route
        .strip_prefix("/api/")
        .and_then(|rest| rest.split('/').next())
        .filter(|segment| !segment.is_empty())
        .unwrap_or("unknown")
        .to_string()
}

const SECRET_FIELDS: &[&str] = &["access_token", "refresh_token", "password"];

/// Blanks credential fields anywhere in a response body before it is logged.
pub fn redact_secrets(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, field) in map.iter_mut() {
                if SECRET_FIELDS.contains(&key.as_str()) {
                    *field = Value::String("[redacted]".into());
                } else {
                    redact_secrets(field);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(redact_secrets),
        _ => {}
    }
}

/// The `id` parameter, else the first parameter, else `"new"`.
pub fn entity_id_of(params: &[(String, String)]) -> String {
    params
        .iter()
        .find(|(name, _)| name == "id")
        .or_else(|| params.first())
        .map(|(_, value)| value.clone())
        .unwrap_or_else(|| "new".to_string())
}

pub async fn record_audit(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if !is_mutation(req.method()) {
        return next.run(req).await;
    }

    let (mut parts, body) = req.into_parts();
    let route = parts
        .extensions
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| parts.uri.path().to_string());
    let params: Vec<(String, String)> = match RawPathParams::from_request_parts(&mut parts, &state).await {
        Ok(raw) => raw
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect(),
        Err(_) => Vec::new(),
    };
    let query = Query::<HashMap<String, String>>::try_from_uri(&parts.uri)
        .map(|Query(q)| q)
        .unwrap_or_default();
    let user_id = bearer_claims(&parts.headers, &state.config.jwt_secret)
        .and_then(Result::ok)
        .map(|claims| claims.sub);
    let action = format!("{} {}", parts.method, route);

    let response = next.run(Request::from_parts(parts, body)).await;
    if !response.status().is_success() {
        return response;
    }

    let (parts, body) = response.into_parts();
    let bytes = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(error = %e, "Could not buffer response for the audit log");
            return Response::from_parts(parts, Body::empty());
        }
    };
    let after = serde_json::from_slice::<Value>(&bytes).ok().map(|mut after| {
        redact_secrets(&mut after);
        after
    });

    let before = json!({
        "params": params
            .iter()
            .map(|(name, value)| (name.clone(), Value::String(value.clone())))
            .collect::<Map<String, Value>>(),
        "query": query,
    });
    state.recorder.record(AuditEvent {
        user_id,
        action,
        entity_type: entity_type_of(&route),
        entity_id: entity_id_of(&params),
        before: Some(before),
        after,
        occurred_at: Utc::now(),
    });

    Response::from_parts(parts, Body::from(bytes))
}

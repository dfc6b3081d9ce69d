//! # Authentication Extractors
//!
//! Bearer JWTs (HS256) carry the caller's id, email and roles, so a request
//! is authorized without touching the database.
//!
//! - [`AuthenticatedUser`]: any valid token, else `401`.
//! - [`Authorized<P>`]: a valid token whose roles intersect `P::ROLES`, else
//!   `403`.
//! - [`MaybeUser`]: the caller if a valid token was sent, `None` otherwise.

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{request::Parts, HeaderMap},
};
use axum_extra::headers::{authorization::Bearer, Authorization, HeaderMapExt};
use chrono::Utc;
use core_access::{has_any_role, Role, User, ADMIN_ROLES, CONTRIBUTOR_ROLES};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use kbase::types::Actor;
use serde::{Deserialize, Serialize};
use std::{marker::PhantomData, net::SocketAddr};
use tracing::warn;

use crate::{config::AppConfig, errors::AppError, state::AppState};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    /// The user id.
    pub sub: String,
    pub email: String,
    pub roles: Vec<String>,
    pub iat: i64,
    pub exp: i64,
}

/// Signs a token for `user` that expires after `jwt_expiry_hours`.
pub fn issue_token(config: &AppConfig, user: &User) -> Result<String, AppError> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: user.id.clone(),
        email: user.email.clone(),
        roles: user.roles.clone(),
        iat: now,
        exp: now + config.jwt_expiry_hours * 3600,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(e.into()))
}

pub fn decode_token(secret: &str, token: &str) -> Result<Claims, AppError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| {
        warn!("JWT validation failed: {}", e);
        AppError::Unauthorized("Invalid or expired token".to_string())
    })
}

/// The claims of a valid bearer token in `headers`, if there is one.
pub fn bearer_claims(headers: &HeaderMap, secret: &str) -> Option<Result<Claims, AppError>> {
    headers
        .typed_get::<Authorization<Bearer>>()
        .map(|Authorization(bearer)| decode_token(secret, bearer.token()))
}

fn client_ip(parts: &Parts) -> Option<String> {
    parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
}

#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub claims: Claims,
    pub ip_address: Option<String>,
}

impl AuthenticatedUser {
    pub fn id(&self) -> &str {
        &self.claims.sub
    }

    pub fn roles(&self) -> &[String] {
        &self.claims.roles
    }

    /// The actor stamped on every mutation this caller makes.
    pub fn actor(&self) -> Actor {
        Actor::user(&self.claims.sub).with_ip(self.ip_address.clone())
    }
}

impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let claims = bearer_claims(&parts.headers, &state.config.jwt_secret)
            .ok_or_else(|| AppError::Unauthorized("Missing bearer token".to_string()))??;
        Ok(AuthenticatedUser {
            claims,
            ip_address: client_ip(parts),
        })
    }
}

/// An optional caller. An invalid token is still rejected, so a stale
/// session is noticed instead of silently downgraded to anonymous.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<AuthenticatedUser>);

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match bearer_claims(&parts.headers, &state.config.jwt_secret) {
            None => Ok(MaybeUser(None)),
            Some(claims) => Ok(MaybeUser(Some(AuthenticatedUser {
                claims: claims?,
                ip_address: client_ip(parts),
            }))),
        }
    }
}

/// A set of roles a route requires.
pub trait RolePolicy {
    const ROLES: &'static [Role];
}

/// contributor, admin, super_admin
pub struct Contributors;

impl RolePolicy for Contributors {
    const ROLES: &'static [Role] = CONTRIBUTOR_ROLES;
}

/// admin, super_admin
pub struct Admins;

impl RolePolicy for Admins {
    const ROLES: &'static [Role] = ADMIN_ROLES;
}

pub struct Authorized<P> {
    pub user: AuthenticatedUser,
    _policy: PhantomData<P>,
}

impl<P> Authorized<P> {
    pub fn actor(&self) -> Actor {
        self.user.actor()
    }
}

impl<P> FromRequestParts<AppState> for Authorized<P>
where
    P: RolePolicy + Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthenticatedUser::from_request_parts(parts, state).await?;
        if !has_any_role(user.roles(), P::ROLES) {
            warn!(user_id = %user.id(), path = %parts.uri.path(), "Insufficient role");
            return Err(AppError::Forbidden(
                "You do not have permission to perform this action".to_string(),
            ));
        }
        Ok(Authorized {
            user,
            _policy: PhantomData,
        })
    }
}

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderValue},
    middleware::Next,
    response::Response,
};
use serde::Serialize;
use tracing::warn;

use super::jwt::{JwtKeys, TokenError};
use crate::api::ApiError;

const MISSING_HEADER: &str = "Authorization header is required";
const MALFORMED_HEADER: &str = "Authorization header must be in the format: Bearer <token>";

/// Identity asserted by a verified token, attached to the request by
/// [`require_auth`].
#[derive(Debug, Clone, Serialize)]
pub struct AuthUser {
    pub user_id: i64,
    pub email: String,
}

/// Pulls the token out of `Bearer <token>`. Anything else is rejected before
/// any signature work happens.
pub(crate) fn bearer_token(header: Option<&HeaderValue>) -> Result<&str, ApiError> {
    let value = header.ok_or_else(|| ApiError::Unauthorized(MISSING_HEADER.into()))?;
    let value = value
        .to_str()
        .map_err(|_| ApiError::Unauthorized(MALFORMED_HEADER.into()))?;
    if value.is_empty() {
        return Err(ApiError::Unauthorized(MISSING_HEADER.into()));
    }

    let mut parts = value.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) if !token.is_empty() => Ok(token),
        _ => Err(ApiError::Unauthorized(MALFORMED_HEADER.into())),
    }
}

/// Middleware guarding authenticated routes. Verification is stateless: the
/// identity in the token is trusted until it expires.
pub async fn require_auth(
    State(keys): State<JwtKeys>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(req.headers().get(AUTHORIZATION)).map_err(|e| {
        warn!(reason = %e, "rejected authorization header");
        e
    })?;

    let claims = match keys.verify(token) {
        Ok(c) => c,
        Err(TokenError::Expired) => {
            warn!("expired token");
            return Err(ApiError::Unauthorized("Token has expired".into()));
        }
        Err(e) => {
            warn!(error = %e, "invalid token");
            return Err(ApiError::Unauthorized("Invalid token".into()));
        }
    };

    let Some(user_id) = claims.user_id() else {
        warn!(sub = %claims.sub, "token subject is not a user id");
        return Err(ApiError::Unauthorized("Invalid token".into()));
    };

    req.extensions_mut().insert(AuthUser {
        user_id,
        email: claims.email,
    });
    Ok(next.run(req).await)
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(|| ApiError::Unauthorized(MISSING_HEADER.into()))
    }
}

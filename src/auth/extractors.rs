use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use super::jwt::JwtKeys;
use crate::error::AppError;

/// Identity of a caller whose bearer token passed the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthContext {
    pub user_id: i64,
}

/// Middleware for the `/secure` routes: validates the bearer token and stores
/// an `AuthContext` in the request extensions.
pub async fn auth_gate(
    State(keys): State<JwtKeys>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let ctx = authenticate(&keys, request.headers())?;
    request.extensions_mut().insert(ctx);
    Ok(next.run(request).await)
}

pub(crate) fn authenticate(keys: &JwtKeys, headers: &HeaderMap) -> Result<AuthContext, AppError> {
    let token = bearer_token(headers).ok_or_else(|| {
        warn!("missing or malformed Authorization header");
        AppError::Unauthorized
    })?;

    let claims = keys.verify(token).map_err(|e| {
        warn!(error = %e, "token rejected");
        AppError::Unauthorized
    })?;

    let user_id = claims.user_id().ok_or_else(|| {
        warn!(sub = %claims.sub, "token subject is not a user id");
        AppError::Unauthorized
    })?;

    Ok(AuthContext { user_id })
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .copied()
            .ok_or(AppError::Unauthorized)
    }
}

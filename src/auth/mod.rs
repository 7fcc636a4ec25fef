use axum::{
    extract::{FromRef, FromRequestParts, OptionalFromRequestParts},
    http::{header, request::Parts},
};
use uuid::Uuid;

use crate::{error::ApiError, models::Role};

pub mod password;
pub mod token;

pub use token::{Claims, IssuedToken, TokenKind, TokenService};

/// AuthUser Extractor Result
///
/// The resolved identity of an authenticated request, taken straight from a
/// verified access token. Handlers pass it to the services, which apply the
/// authorization table.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: Role,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Pulls the raw token out of `Authorization: Bearer <token>`.
/// `Ok(None)` when the header is absent; malformed headers are an error.
fn bearer_token(parts: &Parts) -> Result<Option<&str>, ApiError> {
    let Some(value) = parts.headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };

    let value = value
        .to_str()
        .map_err(|_| ApiError::Unauthenticated("malformed authorization header".to_string()))?;

    let token = value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| {
            ApiError::Unauthenticated("authorization header must use the Bearer scheme".to_string())
        })?;

    Ok(Some(token))
}

/// AuthUser Extractor Implementation
///
/// Makes `AuthUser` usable as a handler argument. The check is stateless:
/// bearer extraction, signature, expiry and token kind. Any failure rejects the
/// request with 401 before the handler runs.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    TokenService: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?
            .ok_or_else(|| ApiError::Unauthenticated("missing bearer token".to_string()))?;

        let tokens = TokenService::from_ref(state);
        let claims = tokens.verify(token, TokenKind::Access)?;

        Ok(AuthUser {
            id: claims.sub,
            role: claims.role,
        })
    }
}

/// `Option<AuthUser>` for public routes that reveal more to signed-in callers.
/// No header means anonymous; a header that fails validation is still a 401.
impl<S> OptionalFromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    TokenService: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        if bearer_token(parts)?.is_none() {
            return Ok(None);
        }
        <AuthUser as FromRequestParts<S>>::from_request_parts(parts, state)
            .await
            .map(Some)
    }
}

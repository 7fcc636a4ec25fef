use axum::{
    Json,
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use ts_rs::TS;
use utoipa::ToSchema;

use crate::{repository::RepositoryError, storage::StorageError};

/// ApiError
///
/// The single error taxonomy shared by services and handlers. Each variant maps to
/// exactly one HTTP status; infrastructure variants carry detail for the server log
/// only and are rendered to clients with a generic message.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("authentication token has expired")]
    TokenExpired,

    #[error("{0}")]
    Unauthenticated(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    MethodNotAllowed(String),

    #[error("{0}")]
    Conflict(String),

    #[error("image provider failure: {0}")]
    Upstream(String),

    #[error("service temporarily unavailable: {0}")]
    Unavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

/// ErrorBody
///
/// Structured JSON error returned by every failing endpoint. `path` is filled in by
/// the `error_envelope` middleware, which is the only layer that sees the request URI.
#[derive(Debug, Clone, Serialize, ToSchema, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[ts(type = "string")]
    pub timestamp: DateTime<Utc>,
    pub path: Option<String>,
    pub retryable: bool,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::InvalidCredentials
            | ApiError::TokenExpired
            | ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::InvalidCredentials => "INVALID_CREDENTIALS",
            ApiError::TokenExpired => "TOKEN_EXPIRED",
            ApiError::Unauthenticated(_) => "UNAUTHENTICATED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::MethodNotAllowed(_) => "METHOD_NOT_ALLOWED",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::Upstream(_) => "UPSTREAM_ERROR",
            ApiError::Unavailable(_) => "SERVICE_UNAVAILABLE",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Transient infrastructure failures the caller may retry as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::Unavailable(_))
    }

    /// Message safe to show a client. Infrastructure detail stays in the logs.
    fn public_message(&self) -> String {
        match self {
            ApiError::Upstream(_) => "The image provider rejected the request".to_string(),
            ApiError::Unavailable(_) => {
                "The service is temporarily unavailable, please retry".to_string()
            }
            ApiError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::Internal(detail) => tracing::error!(error = %detail, "internal error"),
            ApiError::Upstream(detail) => tracing::error!(error = %detail, "upstream failure"),
            ApiError::Unavailable(detail) => {
                tracing::warn!(error = %detail, "dependency unavailable")
            }
            _ => tracing::debug!(code = self.code(), message = %self, "request rejected"),
        }

        let body = ErrorBody {
            code: self.code().to_string(),
            message: self.public_message(),
            timestamp: Utc::now(),
            path: None,
            retryable: self.is_retryable(),
        };

        let mut response = (self.status(), Json(body.clone())).into_response();
        response.extensions_mut().insert(body);
        response
    }
}

/// error_envelope
///
/// Outermost middleware that stamps the request path into structured error bodies.
/// Responses that did not originate from an `ApiError` pass through untouched.
pub async fn error_envelope(request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    let mut response = next.run(request).await;

    let Some(mut body) = response.extensions_mut().remove::<ErrorBody>() else {
        return response;
    };
    body.path = Some(path);

    let (mut parts, _) = response.into_parts();
    parts.headers.remove(axum::http::header::CONTENT_LENGTH);
    let rebuilt = Json(body).into_response();
    let (_, new_body) = rebuilt.into_parts();
    Response::from_parts(parts, new_body)
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::UniqueViolation(constraint) => {
                ApiError::Conflict(conflict_message(&constraint).to_string())
            }
            RepositoryError::MissingReference(constraint) => ApiError::NotFound(format!(
                "referenced entity does not exist ({constraint})"
            )),
            RepositoryError::Unavailable(detail) => ApiError::Unavailable(detail),
            RepositoryError::Database(e) => ApiError::Internal(format!("database error: {e}")),
            RepositoryError::Corrupt(detail) => ApiError::Internal(detail),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Unavailable(detail) => ApiError::Unavailable(detail),
            StorageError::Rejected(detail) => ApiError::Upstream(detail),
        }
    }
}

fn conflict_message(constraint: &str) -> &'static str {
    match constraint {
        "users_username_key" => "username is already taken",
        "users_email_key" => "email is already registered",
        "categories_name_key" => "category name already exists",
        _ => "resource already exists",
    }
}

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::auth::{
    credentials::{AuthFailure, HashError},
    pipeline::Rejection,
    token::TokenError,
};

/// RepoError
///
/// Failures surfaced by the data-access layer. Only `DuplicateUsername` carries
/// meaning for callers; everything else is an unexpected failure.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("username '{0}' is already taken")]
    DuplicateUsername(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("could not serialize audit snapshot: {0}")]
    Snapshot(#[from] serde_json::Error),

    #[error("invalid stored value: {0}")]
    Corrupt(String),

    #[error("injected failure: {0}")]
    Injected(&'static str),
}

/// ApiError
///
/// The HTTP-facing error taxonomy. Every handler returns `Result<_, ApiError>`
/// and the `IntoResponse` impl below is the single place status codes are chosen.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad credentials at login. Never says which half was wrong.
    #[error("authentication failed")]
    AuthenticationFailure,

    #[error("no token provided")]
    NoToken,

    #[error("token rejected: {0}")]
    BadToken(TokenError),

    #[error("unauthorized: {0}")]
    Unauthorized(&'static str),

    #[error("username '{0}' is already taken")]
    Conflict(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    /// Unreadable body. Only reported once the caller has been authorized.
    #[error("invalid request body: {0}")]
    InvalidBody(JsonRejection),

    #[error("unexpected failure: {0}")]
    Unexpected(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::AuthenticationFailure | ApiError::Unauthorized(_) => {
                StatusCode::UNAUTHORIZED.into_response()
            }
            ApiError::NoToken => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "message": "No token provided." })),
            )
                .into_response(),
            ApiError::BadToken(reason) => (
                StatusCode::FORBIDDEN,
                Json(json!({
                    "message": "Failed to authenticate token.",
                    "reason": reason.code(),
                })),
            )
                .into_response(),
            ApiError::Conflict(_) => StatusCode::CONFLICT.into_response(),
            ApiError::NotFound(_) => StatusCode::BAD_REQUEST.into_response(),
            ApiError::InvalidBody(rejection) => rejection.into_response(),
            ApiError::Unexpected(detail) => {
                // Full detail stays in the server log.
                tracing::error!(error = %detail, "request failed unexpectedly");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "status": "server error", "msg": "internal error" })),
                )
                    .into_response()
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidBody(rejection)
    }
}

impl From<RepoError> for ApiError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::DuplicateUsername(username) => ApiError::Conflict(username),
            other => ApiError::Unexpected(other.to_string()),
        }
    }
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Signing => ApiError::Unexpected(err.to_string()),
            other => ApiError::BadToken(other),
        }
    }
}

impl From<HashError> for ApiError {
    fn from(err: HashError) -> Self {
        ApiError::Unexpected(err.to_string())
    }
}

impl From<AuthFailure> for ApiError {
    fn from(err: AuthFailure) -> Self {
        match err {
            AuthFailure::NotFound | AuthFailure::PasswordMismatch => {
                ApiError::AuthenticationFailure
            }
            AuthFailure::Store(e) => ApiError::from(e),
            AuthFailure::Hash(e) => ApiError::from(e),
        }
    }
}

impl From<Rejection> for ApiError {
    fn from(rejection: Rejection) -> Self {
        match rejection {
            Rejection::NoToken => ApiError::NoToken,
            Rejection::BadToken(reason) => ApiError::BadToken(reason),
            Rejection::Unauthorized(reason) => ApiError::Unauthorized(reason),
            Rejection::Internal(detail) => ApiError::Unexpected(detail),
        }
    }
}

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::fmt;

use super::ApiResponse;
use crate::admin::AdminError;
use crate::forms::{DUPLICATE_USERNAME, FormErrors};
use crate::services::{AuthError, PostError};

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),

    DatabaseError(String),

    ValidationError(String),

    /// A form rejected the input; carries per-field messages.
    FormInvalid(FormErrors),

    /// Storage refused the write on a uniqueness constraint.
    Conflict(FormErrors),

    InternalError(String),

    Unauthorized(String),

    Forbidden(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(msg) => write!(f, "Not found: {msg}"),
            Self::DatabaseError(msg) => write!(f, "Database error: {msg}"),
            Self::ValidationError(msg) => write!(f, "Validation error: {msg}"),
            Self::FormInvalid(errors) => write!(f, "Invalid input: {}", errors.summary()),
            Self::Conflict(errors) => write!(f, "Conflict: {}", errors.summary()),
            Self::InternalError(msg) => write!(f, "Internal error: {msg}"),
            Self::Unauthorized(msg) => write!(f, "Unauthorized: {msg}"),
            Self::Forbidden(msg) => write!(f, "Forbidden: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, ApiResponse::<()>::error(msg)),
            Self::DatabaseError(msg) => {
                tracing::error!("Database error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiResponse::error("A database error occurred"),
                )
            }
            Self::ValidationError(msg) => (StatusCode::BAD_REQUEST, ApiResponse::error(msg)),
            Self::FormInvalid(errors) => (
                StatusCode::BAD_REQUEST,
                ApiResponse::form_error("Please correct the errors below.", errors),
            ),
            Self::Conflict(errors) => {
                tracing::warn!("Write rejected by storage: {}", errors.summary());
                (
                    StatusCode::CONFLICT,
                    ApiResponse::form_error("Please correct the errors below.", errors),
                )
            }
            Self::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiResponse::error("An internal error occurred"),
                )
            }
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, ApiResponse::error(msg)),
            Self::Forbidden(msg) => (StatusCode::FORBIDDEN, ApiResponse::error(msg)),
        };

        (status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::InternalError(err.to_string())
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => Self::Unauthorized(err.to_string()),
            AuthError::Invalid(errors) => Self::FormInvalid(errors),
            AuthError::Integrity(_) => Self::duplicate_username(),
            AuthError::AccountNotFound => Self::NotFound(err.to_string()),
            AuthError::InvalidToken => Self::ValidationError(err.to_string()),
            AuthError::Database(msg) => Self::DatabaseError(msg),
            AuthError::Internal(msg) => Self::InternalError(msg),
        }
    }
}

impl From<AdminError> for ApiError {
    fn from(err: AdminError) -> Self {
        match err {
            AdminError::PermissionDenied => Self::Forbidden(err.to_string()),
            AdminError::NotRegistered(_) | AdminError::NotFound(_) => {
                Self::NotFound(err.to_string())
            }
            AdminError::Invalid(errors) => Self::FormInvalid(errors),
            AdminError::Integrity(_) => Self::duplicate_username(),
            AdminError::Storage(msg) => Self::DatabaseError(msg),
            AdminError::Binding { .. } | AdminError::AlreadyRegistered(_) => {
                Self::InternalError(err.to_string())
            }
        }
    }
}

impl From<PostError> for ApiError {
    fn from(err: PostError) -> Self {
        match err {
            PostError::Validation(msg) => Self::ValidationError(msg),
            PostError::NotFound(_) => Self::NotFound(err.to_string()),
            PostError::Database(msg) => Self::DatabaseError(msg),
        }
    }
}

impl ApiError {
    pub fn duplicate_username() -> Self {
        let mut errors = FormErrors::new();
        errors.add("username", DUPLICATE_USERNAME);
        Self::Conflict(errors)
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::InternalError(msg.into())
    }

    pub fn unauthenticated() -> Self {
        Self::Unauthorized("Authentication credentials were not provided".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integrity_maps_to_conflict_on_username() {
        let err = ApiError::from(AuthError::Integrity("alice".to_string()));
        match err {
            ApiError::Conflict(errors) => {
                assert_eq!(errors.get("username"), [DUPLICATE_USERNAME.to_string()]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn permission_denied_maps_to_forbidden() {
        let response = ApiError::from(AdminError::PermissionDenied).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn bad_credentials_map_to_unauthorized() {
        let response = ApiError::from(AuthError::InvalidCredentials).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}

//! Structured error types for API responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::fmt;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors
    MissingRequiredField,
    InvalidFieldValue,
    EmailTaken,

    // Auth errors
    Unauthorized,
    InvalidCredentials,

    // Not found errors
    TaskNotFound,
    UserNotFound,
    ShareNotFound,
    NotificationNotFound,

    // Authorization errors where the subject is known to exist
    Forbidden,

    // Internal errors
    DatabaseError,
    InternalError,
}

impl ErrorCode {
    fn status(&self) -> StatusCode {
        match self {
            ErrorCode::MissingRequiredField
            | ErrorCode::InvalidFieldValue
            | ErrorCode::EmailTaken => StatusCode::BAD_REQUEST,
            ErrorCode::Unauthorized | ErrorCode::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ErrorCode::TaskNotFound
            | ErrorCode::UserNotFound
            | ErrorCode::ShareNotFound
            | ErrorCode::NotificationNotFound => StatusCode::NOT_FOUND,
            ErrorCode::Forbidden => StatusCode::FORBIDDEN,
            ErrorCode::DatabaseError | ErrorCode::InternalError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Structured error surfaced to the HTTP layer.
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            field: None,
            details: None,
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    // Convenience constructors

    pub fn missing_field(field: &str) -> Self {
        Self::new(
            ErrorCode::MissingRequiredField,
            format!("{} is required", field),
        )
        .with_field(field)
    }

    pub fn invalid_value(field: &str, reason: &str) -> Self {
        Self::new(ErrorCode::InvalidFieldValue, reason).with_field(field)
    }

    pub fn email_taken(email: &str) -> Self {
        Self::new(
            ErrorCode::EmailTaken,
            format!("Email already registered: {}", email),
        )
        .with_field("email")
    }

    pub fn unauthorized(reason: &str) -> Self {
        Self::new(ErrorCode::Unauthorized, reason)
    }

    pub fn invalid_credentials() -> Self {
        Self::new(ErrorCode::InvalidCredentials, "Invalid email or password")
    }

    /// Covers both "task does not exist" and "task not visible to caller" --
    /// the two are deliberately indistinguishable to avoid leaking existence.
    pub fn task_not_found(task_id: &str) -> Self {
        Self::new(
            ErrorCode::TaskNotFound,
            format!("Task not found: {}", task_id),
        )
    }

    pub fn user_not_found(ident: &str) -> Self {
        Self::new(
            ErrorCode::UserNotFound,
            format!("User not found: {}", ident),
        )
    }

    pub fn share_not_found(task_id: &str, user_id: &str) -> Self {
        Self::new(
            ErrorCode::ShareNotFound,
            format!("No share on task {} for user {}", task_id, user_id),
        )
    }

    pub fn notification_not_found(id: &str) -> Self {
        Self::new(
            ErrorCode::NotificationNotFound,
            format!("Notification not found: {}", id),
        )
    }

    pub fn forbidden(reason: &str) -> Self {
        Self::new(ErrorCode::Forbidden, reason)
    }

    pub fn database(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::DatabaseError, err.to_string())
    }

    pub fn internal(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::InternalError, err.to_string())
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApiError {}

// Allow using ? with anyhow errors by converting them
impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        // Try to downcast to ApiError first
        match err.downcast::<ApiError>() {
            Ok(api_err) => api_err,
            Err(err) => ApiError::internal(err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.code.status();
        if status.is_server_error() {
            tracing::error!(code = ?self.code, message = %self.message, "Internal error");
        }
        (status, Json(self)).into_response()
    }
}

/// Result type for service operations.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

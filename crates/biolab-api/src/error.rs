//! API error handling
//!
//! Author: hephaex@gmail.com

use crate::auth::password::PasswordError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use biolab_core::LabError;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// API error response
///
/// `message` carries the human-readable summary; `error` carries either the
/// credential failure text or the underlying error detail.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ApiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            error: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.error = Some(details.into());
        self
    }

    pub fn invalid_credentials() -> Self {
        Self {
            message: None,
            error: Some("Invalid credentials".to_string()),
        }
    }
}

/// Application error type
#[derive(Debug)]
pub enum AppError {
    /// No valid session; answered with a bare 401
    Unauthenticated,
    /// Unknown user or wrong password; the two are indistinguishable
    InvalidCredentials,
    Forbidden(String),
    NotFound(String),
    BadRequest(String),
    Validation { message: String, details: String },
    Internal { message: String, details: String },
}

impl AppError {
    pub fn forbidden(message: impl Into<String>) -> Self {
        AppError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        AppError::NotFound(message.into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        AppError::BadRequest(message.into())
    }

    pub fn validation(message: impl Into<String>, details: impl ToString) -> Self {
        AppError::Validation {
            message: message.into(),
            details: details.to_string(),
        }
    }

    pub fn internal(message: impl Into<String>, details: impl ToString) -> Self {
        AppError::Internal {
            message: message.into(),
            details: details.to_string(),
        }
    }

    /// Attach a summary to a store failure, keeping the status it maps to
    pub fn context(message: &str) -> impl FnOnce(LabError) -> AppError + '_ {
        move |err| match AppError::from(err) {
            AppError::Internal { details, .. } => AppError::internal(message, details),
            AppError::Validation { details, .. } => AppError::validation(message, details),
            other => other,
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::Unauthenticated => f.write_str("unauthenticated"),
            AppError::InvalidCredentials => f.write_str("invalid credentials"),
            AppError::Forbidden(msg)
            | AppError::NotFound(msg)
            | AppError::BadRequest(msg) => f.write_str(msg),
            AppError::Validation { message, details } | AppError::Internal { message, details } => {
                write!(f, "{message}: {details}")
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            AppError::Unauthenticated => return StatusCode::UNAUTHORIZED.into_response(),
            AppError::InvalidCredentials => {
                (StatusCode::UNAUTHORIZED, ApiError::invalid_credentials())
            }
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, ApiError::new(msg)),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, ApiError::new(msg)),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, ApiError::new(msg)),
            AppError::Validation { message, details } => (
                StatusCode::BAD_REQUEST,
                ApiError::new(message).with_details(details),
            ),
            AppError::Internal { message, details } => {
                tracing::error!(error = %details, "{message}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiError::new(message).with_details(details),
                )
            }
        };

        (status, Json(error)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::internal("Internal server error", err)
    }
}

impl From<LabError> for AppError {
    fn from(err: LabError) -> Self {
        match err {
            LabError::NotFound(msg) => AppError::NotFound(msg),
            LabError::Conflict(msg) => AppError::BadRequest(msg),
            LabError::ValidationError(msg) => AppError::validation("Invalid data", msg),
            LabError::DatabaseError(msg) => AppError::internal("Database operation failed", msg),
            LabError::ConfigError(msg) => AppError::internal("Configuration error", msg),
            LabError::Other(err) => AppError::internal("Internal server error", err),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::validation("Invalid data", err)
    }
}

impl From<PasswordError> for AppError {
    fn from(err: PasswordError) -> Self {
        AppError::internal("Password hashing failed", err)
    }
}

/// Unified error types for the Campus Report portal
use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Message shown to users for any persistence or internal failure.
pub const GENERIC_FAILURE: &str = "Operation failed. Please try again.";

/// Main error type for the portal
#[derive(Error, Debug)]
pub enum PortalError {
    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Missing or malformed form fields, duplicate usernames/emails
    #[error("{0}")]
    Validation(String),

    /// Unknown email or wrong password
    #[error("Invalid email or password.")]
    InvalidCredentials,

    /// Credentials were correct but the account is not verified
    #[error("Please verify your email before logging in.")]
    NotVerified,

    /// Credentials were correct but the account was deactivated
    #[error("This account has been deactivated.")]
    AccountInactive,

    /// Missing session or insufficient role. Deliberately indistinguishable.
    #[error("Access denied.")]
    AccessDenied,

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PortalError {
    /// True for failures the user cannot fix by changing their input.
    pub fn is_persistence(&self) -> bool {
        matches!(
            self,
            PortalError::Database(_) | PortalError::Internal(_) | PortalError::Io(_)
        )
    }

    /// Map a unique-constraint violation to a validation error carrying
    /// `message`; every other database error passes through.
    pub fn unique_violation(err: sqlx::Error, message: &str) -> Self {
        match err {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                PortalError::Validation(message.to_string())
            }
            other => PortalError::Database(other),
        }
    }

    /// Message safe to show to the user
    pub fn user_message(&self) -> String {
        if self.is_persistence() {
            GENERIC_FAILURE.to_string()
        } else {
            self.to_string()
        }
    }
}

/// JSON error body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Convert PortalError to HTTP response
impl IntoResponse for PortalError {
    fn into_response(self) -> Response {
        if let PortalError::AccessDenied = self {
            crate::metrics::ACCESS_DENIED_TOTAL.inc();
            return crate::api::flash::FlashRedirect::danger("/login", self.to_string())
                .into_response();
        }

        let (status, error_code) = match &self {
            PortalError::Validation(_) => (StatusCode::BAD_REQUEST, "ValidationError"),
            PortalError::InvalidCredentials
            | PortalError::NotVerified
            | PortalError::AccountInactive => (StatusCode::UNAUTHORIZED, "AuthError"),
            PortalError::NotFound(_) => (StatusCode::NOT_FOUND, "NotFoundError"),
            PortalError::AccessDenied => (StatusCode::SEE_OTHER, "AccessDenied"),
            PortalError::Database(_) | PortalError::Internal(_) | PortalError::Io(_) => {
                tracing::error!(error = %self, "request_failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "PersistenceError")
            }
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message: self.user_message(),
        });

        (status, [(header::CACHE_CONTROL, "no-store")], body).into_response()
    }
}

/// Result type alias for portal operations
pub type PortalResult<T> = Result<T, PortalError>;

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Why a booking request was not admitted.
///
/// These are expected outcomes shown to the user, not failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdmissionError {
    #[error("This date is not available for booking.")]
    DateDisabled,

    #[error("This time slot is not available for booking.")]
    SlotDisabled,

    #[error("You already have {count} of {limit} bookings allowed this month.")]
    QuotaExceeded { limit: u32, count: u32 },
}

impl AdmissionError {
    pub fn code(&self) -> &'static str {
        match self {
            AdmissionError::DateDisabled => "date_disabled",
            AdmissionError::SlotDisabled => "slot_disabled",
            AdmissionError::QuotaExceeded { .. } => "quota_exceeded",
        }
    }
}

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Admission(#[from] AdmissionError),

    #[error("Authentication required")]
    Unauthorized,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Identity provider error: {0}")]
    IdentityProvider(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Admission(e) => e.code(),
            AppError::Unauthorized => "unauthorized",
            AppError::InvalidToken => "invalid_token",
            AppError::PermissionDenied(_) => "permission_denied",
            AppError::NotFound(_) => "not_found",
            AppError::AlreadyExists(_) => "already_exists",
            AppError::InvalidArgument(_) => "invalid_argument",
            AppError::IdentityProvider(_) | AppError::Database(_) | AppError::Internal(_) => {
                "internal"
            }
        }
    }

    /// Short text suitable for showing to the user.
    ///
    /// Storage and internal failure details are never included.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Admission(e) => e.to_string(),
            AppError::Unauthorized | AppError::InvalidToken => {
                "Please sign in again.".to_string()
            }
            AppError::PermissionDenied(_) => {
                "You are not allowed to perform this action.".to_string()
            }
            AppError::NotFound(_) => "The requested item no longer exists.".to_string(),
            AppError::AlreadyExists(msg) | AppError::InvalidArgument(msg) => msg.clone(),
            // Unrecognized provider error: its own text is the only thing to show.
            AppError::IdentityProvider(msg) => msg.clone(),
            AppError::Database(_) | AppError::Internal(_) => {
                "Something went wrong. Please try again.".to_string()
            }
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::Admission(_) => StatusCode::CONFLICT,
            AppError::Unauthorized | AppError::InvalidToken => StatusCode::UNAUTHORIZED,
            AppError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::AlreadyExists(_) => StatusCode::CONFLICT,
            AppError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            AppError::IdentityProvider(_) => StatusCode::BAD_GATEWAY,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let details = match &self {
            AppError::Admission(AdmissionError::QuotaExceeded { limit, count }) => {
                Some(format!("{}/{}", count, limit))
            }
            AppError::NotFound(msg) => Some(msg.clone()),
            AppError::IdentityProvider(msg) => {
                tracing::warn!(error = %msg, "Unrecognized identity provider error");
                None
            }
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                None
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                None
            }
            _ => None,
        };

        let body = ErrorResponse {
            error: self.code(),
            message: self.user_message(),
            details,
        };

        (self.status(), Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admission_errors_are_conflicts_with_codes() {
        let err = AppError::from(AdmissionError::QuotaExceeded { limit: 2, count: 2 });
        assert_eq!(err.code(), "quota_exceeded");
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert!(err.user_message().contains("2 of 2"));

        let err = AppError::from(AdmissionError::DateDisabled);
        assert_eq!(err.code(), "date_disabled");
    }

    #[test]
    fn test_backend_details_are_not_user_visible() {
        let err = AppError::Database("deadline exceeded on projects/x".to_string());
        assert!(!err.user_message().contains("projects/x"));
        assert_eq!(err.code(), "internal");
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_permission_denied_maps_to_forbidden() {
        let err = AppError::PermissionDenied("not owner".to_string());
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
        assert_eq!(err.code(), "permission_denied");
    }
}

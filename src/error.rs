//! Error types for the Slotwise server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Stable numeric codes returned in error bodies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    Success = 0,
    Failure = 1,
    NotAuthorized = 2,
    DbFailure = 3,
    NoSuchData = 4,
    BadValue = 5,
    Duplicate = 6,
    CapacityExceeded = 10,
    SlotUnavailable = 11,
    NotCancellable = 12,
    NotReschedulable = 13,
    LockContention = 14,
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Authorization failed: {0}")]
    Authorization(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Business rule violation: {0}")]
    BusinessRule(String),

    /// Requested participants exceed the service ceiling
    #[error("Capacity exceeded: {0}")]
    CapacityExceeded(String),

    /// No remaining capacity, slot blocked, or race lost to another booking
    #[error("Slot unavailable: {0}")]
    SlotUnavailable(String),

    #[error("Booking cannot be cancelled: {0}")]
    NotCancellable(String),

    #[error("Booking cannot be rescheduled: {0}")]
    NotReschedulable(String),

    /// The slot row could not be locked in time; the whole operation may be retried
    #[error("Lock contention: {0}")]
    LockContention(String),
}

impl AppError {
    /// Whether retrying the whole operation can succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::LockContention(_))
    }

    /// Classify a storage error, separating lock/serialization failures from real faults
    pub fn from_storage(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db) = e {
            // lock_not_available, deadlock_detected, serialization_failure
            if matches!(db.code().as_deref(), Some("55P03") | Some("40P01") | Some("40001")) {
                return AppError::LockContention(db.message().to_string());
            }
        }
        AppError::Database(e)
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

/// Error response body
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub code: u32,
    pub error: String,
    pub message: String,
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, ErrorCode) {
        match self {
            AppError::Authentication(_) => (StatusCode::UNAUTHORIZED, ErrorCode::NotAuthorized),
            AppError::Authorization(_) => (StatusCode::FORBIDDEN, ErrorCode::NotAuthorized),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, ErrorCode::NoSuchData),
            AppError::Validation(_) | AppError::BadRequest(_) => {
                (StatusCode::BAD_REQUEST, ErrorCode::BadValue)
            }
            AppError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::DbFailure),
            AppError::Conflict(_) => (StatusCode::CONFLICT, ErrorCode::Duplicate),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::Failure),
            AppError::BusinessRule(_) => (StatusCode::UNPROCESSABLE_ENTITY, ErrorCode::Failure),
            AppError::CapacityExceeded(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, ErrorCode::CapacityExceeded)
            }
            AppError::SlotUnavailable(_) => (StatusCode::CONFLICT, ErrorCode::SlotUnavailable),
            AppError::NotCancellable(_) => (StatusCode::CONFLICT, ErrorCode::NotCancellable),
            AppError::NotReschedulable(_) => (StatusCode::CONFLICT, ErrorCode::NotReschedulable),
            AppError::LockContention(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, ErrorCode::LockContention)
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match &self {
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                "Database error".to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal server error".to_string()
            }
            AppError::Authentication(msg)
            | AppError::Authorization(msg)
            | AppError::NotFound(msg)
            | AppError::Validation(msg)
            | AppError::Conflict(msg)
            | AppError::BadRequest(msg)
            | AppError::BusinessRule(msg)
            | AppError::CapacityExceeded(msg)
            | AppError::SlotUnavailable(msg)
            | AppError::NotCancellable(msg)
            | AppError::NotReschedulable(msg)
            | AppError::LockContention(msg) => msg.clone(),
        };

        let body = Json(ErrorResponse {
            code: code as u32,
            error: format!("{:?}", code),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;

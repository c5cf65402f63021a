use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde_json::json;
use thiserror::Error;

/// Errors raised while recording or evaluating attendance.
#[derive(Debug, Clone, Error)]
pub enum AttendanceError {
    #[error("Employee {0} not found")]
    EmployeeNotFound(u64),

    #[error("Attendance record not found")]
    RecordNotFound,

    #[error("Attendance policy not found")]
    PolicyNotFound,

    #[error("Attendance policy already exists for this company")]
    PolicyExists,

    #[error("Already checked in today")]
    AlreadyCheckedIn,

    #[error("No active check-in found for today")]
    NoOpenCheckIn,

    #[error("Attendance already marked fully for today")]
    AlreadyClosed,

    #[error("{0}")]
    Validation(String),

    /// Grace usage could not be counted; the caller may retry.
    #[error("Grace usage lookup failed: {0}")]
    Ledger(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl AttendanceError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, AttendanceError::Ledger(_))
    }
}

impl From<sqlx::Error> for AttendanceError {
    fn from(e: sqlx::Error) -> Self {
        AttendanceError::Storage(e.to_string())
    }
}

impl ResponseError for AttendanceError {
    fn status_code(&self) -> StatusCode {
        match self {
            AttendanceError::EmployeeNotFound(_)
            | AttendanceError::RecordNotFound
            | AttendanceError::PolicyNotFound => StatusCode::NOT_FOUND,
            AttendanceError::PolicyExists => StatusCode::CONFLICT,
            AttendanceError::AlreadyCheckedIn
            | AttendanceError::NoOpenCheckIn
            | AttendanceError::AlreadyClosed
            | AttendanceError::Validation(_) => StatusCode::BAD_REQUEST,
            AttendanceError::Ledger(_) => StatusCode::SERVICE_UNAVAILABLE,
            AttendanceError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            AttendanceError::Storage(_) => "Internal Server Error".to_string(),
            other => other.to_string(),
        };

        let mut builder = HttpResponse::build(self.status_code());
        if self.is_retryable() {
            builder.insert_header(("Retry-After", "1"));
        }
        builder.json(json!({ "message": message }))
    }
}

//! Application-wide error types and their HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use crate::loan::LoanState;

#[derive(Debug, Error)]
pub enum LoanError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Loan {0} not found")]
    NotFound(i64),

    #[error("Loan must be in {required} state (currently {actual})")]
    InvalidState {
        required: LoanState,
        actual: LoanState,
    },

    #[error("Investment of {requested} exceeds remaining principal of {available}")]
    CapacityExceeded {
        requested: Decimal,
        available: Decimal,
    },

    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("Loan {0} was modified concurrently; reload and retry")]
    Conflict(i64),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Stored record is corrupt: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, LoanError>;

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
}

impl LoanError {
    pub fn error_code(&self) -> &'static str {
        match self {
            LoanError::Validation(_) => "VALIDATION_ERROR",
            LoanError::NotFound(_) => "NOT_FOUND",
            LoanError::InvalidState { .. } => "INVALID_STATE",
            LoanError::CapacityExceeded { .. } => "CAPACITY_EXCEEDED",
            LoanError::Precondition(_) => "PRECONDITION_FAILED",
            LoanError::Conflict(_) => "CONFLICT",
            LoanError::Database(_) | LoanError::Migrate(_) => "DATABASE_ERROR",
            LoanError::Storage(_) | LoanError::Config(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            LoanError::Validation(_)
            | LoanError::InvalidState { .. }
            | LoanError::CapacityExceeded { .. } => StatusCode::BAD_REQUEST,
            LoanError::NotFound(_) => StatusCode::NOT_FOUND,
            LoanError::Precondition(_) => StatusCode::UNPROCESSABLE_ENTITY,
            LoanError::Conflict(_) => StatusCode::CONFLICT,
            LoanError::Database(_)
            | LoanError::Migrate(_)
            | LoanError::Storage(_)
            | LoanError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for LoanError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(error = %message, code, "Request failed");
        } else {
            tracing::debug!(error = %message, code, "Request rejected");
        }

        (
            status,
            Json(ErrorResponse {
                error: message,
                code,
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn domain_errors_map_to_client_statuses() {
        assert_eq!(
            LoanError::Validation("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(LoanError::NotFound(7).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            LoanError::InvalidState {
                required: LoanState::Proposed,
                actual: LoanState::Approved,
            }
            .status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            LoanError::CapacityExceeded {
                requested: dec!(60000),
                available: dec!(50000),
            }
            .status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            LoanError::Precondition("x".into()).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(LoanError::Conflict(1).status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn infrastructure_errors_are_server_errors() {
        assert_eq!(
            LoanError::Storage("bad row".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            LoanError::Database(sqlx::Error::PoolTimedOut).error_code(),
            "DATABASE_ERROR"
        );
    }

    #[test]
    fn invalid_state_names_the_required_state() {
        let err = LoanError::InvalidState {
            required: LoanState::Invested,
            actual: LoanState::Approved,
        };
        assert_eq!(err.error_code(), "INVALID_STATE");
        assert_eq!(
            err.to_string(),
            "Loan must be in invested state (currently approved)"
        );
    }
}

//! Error handling module
//!
//! HTTP-facing error type and response conversion.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::domain::{AmountError, BadOrderType};
use crate::ledger::LedgerError;

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Client errors (4xx)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(#[from] AmountError),

    #[error(transparent)]
    BadOrderType(#[from] BadOrderType),

    // Ledger errors
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    // Server errors (5xx)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str, Option<String>) {
        match self {
            // 400 Bad Request
            AppError::InvalidRequest(msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", Some(msg.clone()))
            }
            AppError::InvalidAmount(_) => (StatusCode::BAD_REQUEST, "invalid_amount", None),
            AppError::BadOrderType(err) => {
                (StatusCode::BAD_REQUEST, "bad_order_type", Some(err.0.clone()))
            }

            AppError::Ledger(err) => match err {
                LedgerError::InsufficientFunds { account_id, .. } => (
                    StatusCode::BAD_REQUEST,
                    "insufficient_funds",
                    Some(account_id.to_string()),
                ),

                // 404 Not Found
                LedgerError::AccountNotFound(id) => {
                    (StatusCode::NOT_FOUND, "account_not_found", Some(id.to_string()))
                }
                LedgerError::NoHistory(id) => {
                    (StatusCode::NOT_FOUND, "no_history", Some(id.to_string()))
                }
                LedgerError::NoActiveReservation { order_id, .. } => (
                    StatusCode::NOT_FOUND,
                    "no_active_reservation",
                    Some(order_id.to_string()),
                ),
                LedgerError::NoReportRecords { .. } => {
                    (StatusCode::NOT_FOUND, "no_report_records", None)
                }

                // 409 Conflict
                LedgerError::SerializationConflict => (
                    StatusCode::CONFLICT,
                    "serialization_conflict",
                    Some("retry the request".to_string()),
                ),
                LedgerError::DuplicateOrder { order_id, .. } => {
                    (StatusCode::CONFLICT, "duplicate_order", Some(order_id.to_string()))
                }
                LedgerError::AlreadyFinalized { order_id, .. } => {
                    (StatusCode::CONFLICT, "already_finalized", Some(order_id.to_string()))
                }

                // 422 Unprocessable Entity
                LedgerError::RevenueExceedsHeld { .. } => {
                    (StatusCode::UNPROCESSABLE_ENTITY, "revenue_exceeds_held", None)
                }

                // 500 Internal Server Error
                LedgerError::Database(e) => {
                    tracing::error!("Database error: {:?}", e);
                    (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
                }
            },

            // 500 Internal Server Error
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, details) = self.status_and_code();

        // Driver messages stay in the log
        let error = if status.is_server_error() {
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let body = ErrorResponse {
            error,
            error_code: error_code.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn status_of(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_ledger_error_status_mapping() {
        assert_eq!(
            status_of(LedgerError::SerializationConflict.into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(
                LedgerError::InsufficientFunds {
                    account_id: 2,
                    required: dec!(10),
                    available: dec!(5),
                }
                .into()
            ),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_of(LedgerError::AccountNotFound(9).into()), StatusCode::NOT_FOUND);
        assert_eq!(
            status_of(
                LedgerError::AlreadyFinalized { account_id: 2, service_id: 1, order_id: 1 }.into()
            ),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(
                LedgerError::RevenueExceedsHeld { requested: dec!(2), held: dec!(1) }.into()
            ),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn test_client_errors_are_4xx() {
        assert_eq!(
            status_of(AppError::InvalidAmount(AmountError::NotPositive(dec!(0)))),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(BadOrderType("name".to_string()).into()),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_server_error_hides_message() {
        let err = AppError::Ledger(LedgerError::Database(sqlx::Error::PoolTimedOut));
        let (_, code, details) = err.status_and_code();
        assert_eq!(code, "database_error");
        assert!(details.is_none());
    }
}

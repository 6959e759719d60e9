//! Ledger Errors
//!
//! Closed set of failure kinds returned by the ledger core. Driver errors are
//! translated into these once, at the transaction boundary.

use rust_decimal::Decimal;

use crate::domain::AccountId;

/// SQLSTATE raised by PostgreSQL when a serializable transaction is aborted
const SERIALIZATION_FAILURE: &str = "40001";
/// SQLSTATE for a detected deadlock; retryable the same way
const DEADLOCK_DETECTED: &str = "40P01";
const UNIQUE_VIOLATION: &str = "23505";

/// Errors that can occur in the ledger core
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Transaction aborted by the database's conflict detector
    #[error("Serialization conflict: transaction aborted by concurrent update")]
    SerializationConflict,

    /// Debit larger than the sender's current balance
    #[error("Insufficient funds on account {account_id}: required {required}, available {available}")]
    InsufficientFunds {
        account_id: AccountId,
        required: Decimal,
        available: Decimal,
    },

    /// Account has neither postings nor a balance checkpoint
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    /// Account has no postings at all
    #[error("No history for account {0}")]
    NoHistory(AccountId),

    #[error("Order {order_id} for service {service_id} is already reserved by account {account_id}")]
    DuplicateOrder {
        account_id: AccountId,
        service_id: i64,
        order_id: i64,
    },

    #[error("No active reservation for order {order_id} of service {service_id} (account {account_id})")]
    NoActiveReservation {
        account_id: AccountId,
        service_id: i64,
        order_id: i64,
    },

    #[error("Requested revenue {requested} exceeds held amount {held}")]
    RevenueExceedsHeld { requested: Decimal, held: Decimal },

    /// Revenue or unreservation already recorded for the order
    #[error("Order {order_id} for service {service_id} is already finalized")]
    AlreadyFinalized {
        account_id: AccountId,
        service_id: i64,
        order_id: i64,
    },

    #[error("No report records for {year}-{month:02}")]
    NoReportRecords { year: i32, month: u32 },

    /// Unclassified database failure
    #[error("Database error: {0}")]
    Database(sqlx::Error),
}

impl LedgerError {
    /// Only serialization conflicts are worth retrying with the same input.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::SerializationConflict)
    }
}

impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        if is_serialization_failure(&err) {
            return LedgerError::SerializationConflict;
        }
        LedgerError::Database(err)
    }
}

/// Check if an error is a serialization failure or deadlock.
pub(crate) fn is_serialization_failure(err: &sqlx::Error) -> bool {
    sqlstate(err).is_some_and(is_retryable_sqlstate)
}

/// Check if an error is a unique constraint violation.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    sqlstate(err).is_some_and(|code| code == UNIQUE_VIOLATION)
}

fn sqlstate(err: &sqlx::Error) -> Option<String> {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().map(|code| code.into_owned()),
        _ => None,
    }
}

fn is_retryable_sqlstate(code: String) -> bool {
    code == SERIALIZATION_FAILURE || code == DEADLOCK_DETECTED
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_sqlstates() {
        assert!(is_retryable_sqlstate("40001".to_string()));
        assert!(is_retryable_sqlstate("40P01".to_string()));
        assert!(!is_retryable_sqlstate("23505".to_string()));
    }

    #[test]
    fn test_non_database_errors_stay_generic() {
        let err: LedgerError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, LedgerError::Database(_)));
        assert!(!err.is_retryable());
        assert!(!is_unique_violation(&sqlx::Error::PoolTimedOut));
    }

    #[test]
    fn test_only_serialization_conflict_is_retryable() {
        assert!(LedgerError::SerializationConflict.is_retryable());
        assert!(!LedgerError::AccountNotFound(5).is_retryable());
        assert!(!LedgerError::NoReportRecords { year: 2024, month: 1 }.is_retryable());
    }

    #[test]
    fn test_revenue_error_display() {
        let err = LedgerError::RevenueExceedsHeld {
            requested: Decimal::new(20000, 2),
            held: Decimal::new(10000, 2),
        };
        assert!(err.to_string().contains("200.00"));
    }

    #[test]
    fn test_report_error_display() {
        let err = LedgerError::NoReportRecords { year: 2022, month: 3 };
        assert_eq!(err.to_string(), "No report records for 2022-03");
    }
}

//! Transaction coordination
//!
//! Every ledger mutation runs inside a SERIALIZABLE transaction. An operation
//! either opens its own top-level transaction or joins one supplied by the
//! caller as a savepoint, so several operations can commit as one unit.

use sqlx::{Connection, PgConnection, PgPool, Postgres, Transaction};

use super::LedgerError;

/// Where an operation runs.
pub enum Session<'s> {
    /// Open a new top-level SERIALIZABLE transaction.
    New,
    /// Run as a savepoint inside the caller's open transaction. The caller
    /// keeps ownership and decides whether the whole unit commits.
    Nested(&'s mut PgConnection),
}

impl<'s> Session<'s> {
    /// Join an open transaction.
    pub fn nested(tx: &'s mut Transaction<'_, Postgres>) -> Self {
        Session::Nested(&mut **tx)
    }

    pub fn is_nested(&self) -> bool {
        matches!(self, Session::Nested(_))
    }
}

/// Begin a top-level transaction at SERIALIZABLE isolation.
pub async fn begin_serializable(pool: &PgPool) -> Result<Transaction<'static, Postgres>, LedgerError> {
    let mut tx = pool.begin().await?;

    // Must be the first statement of the transaction
    sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
        .execute(&mut *tx)
        .await?;

    Ok(tx)
}

/// Open the transaction (or savepoint) an operation runs in.
pub(crate) async fn begin<'s>(
    pool: &PgPool,
    session: Session<'s>,
) -> Result<Transaction<'s, Postgres>, LedgerError> {
    match session {
        Session::New => begin_serializable(pool).await,
        // Savepoint; isolation is inherited from the parent transaction
        Session::Nested(conn) => Ok(conn.begin().await?),
    }
}

/// Commit on success, roll back on failure.
///
/// A failed rollback is logged and the original error is returned unchanged.
/// Commit failures are classified like any other database error, so a
/// serialization abort at commit time surfaces as `SerializationConflict`.
pub(crate) async fn finish<T>(
    tx: Transaction<'_, Postgres>,
    result: Result<T, LedgerError>,
) -> Result<T, LedgerError> {
    match result {
        Ok(value) => {
            tx.commit().await.map_err(|e| {
                let err = LedgerError::from(e);
                if err.is_retryable() {
                    tracing::warn!(error = %err, "Transaction commit aborted by serialization conflict");
                }
                err
            })?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::error!(
                    error = %rollback_err,
                    original_error = %err,
                    "Failed to roll back transaction"
                );
            }
            if err.is_retryable() {
                tracing::warn!(error = %err, "Transaction aborted by serialization conflict");
            }
            Err(err)
        }
    }
}

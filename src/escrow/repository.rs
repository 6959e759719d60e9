//! Escrow bookkeeping tables
//!
//! `deferred_expenses` holds reservation and unreservation rows,
//! `consolidated_report` holds recognized revenue. Both are written inside
//! the caller's transaction, next to the postings they point at.

use sqlx::PgConnection;

use crate::domain::Amount;
use crate::ledger::{is_unique_violation, LedgerError};

use super::state::{already_finalized, duplicate_order, ExpenseOperation, OrderKey, OrderRecords};

#[derive(sqlx::FromRow)]
struct OrderRow {
    reserved_price: Option<i64>,
    recognized: bool,
    unreserved: bool,
}

/// Load every bookkeeping row that exists for `key`
pub(crate) async fn load_order(
    conn: &mut PgConnection,
    key: &OrderKey,
) -> Result<OrderRecords, LedgerError> {
    let row: OrderRow = sqlx::query_as(
        r#"
        SELECT
            (SELECT price FROM deferred_expenses
             WHERE account_id = $1 AND service_id = $2 AND order_id = $3 AND operation = $4)
                AS reserved_price,
            EXISTS(SELECT 1 FROM consolidated_report
                   WHERE account_id = $1 AND service_id = $2 AND order_id = $3)
                AS recognized,
            EXISTS(SELECT 1 FROM deferred_expenses
                   WHERE account_id = $1 AND service_id = $2 AND order_id = $3 AND operation = $5)
                AS unreserved
        "#,
    )
    .bind(key.account_id)
    .bind(key.service_id)
    .bind(key.order_id)
    .bind(ExpenseOperation::Reservation)
    .bind(ExpenseOperation::Unreservation)
    .fetch_one(&mut *conn)
    .await?;

    let reserved = row
        .reserved_price
        .map(Amount::from_minor)
        .transpose()
        .map_err(|e| LedgerError::Database(sqlx::Error::Decode(Box::new(e))))?;

    Ok(OrderRecords {
        reserved,
        recognized: row.recognized,
        unreserved: row.unreserved,
    })
}

/// Insert a `deferred_expenses` row.
///
/// The unique `(account_id, service_id, order_id, operation)` constraint turns
/// a second reservation into `DuplicateOrder` and a second unreservation
/// into `AlreadyFinalized`.
pub(crate) async fn insert_deferred_expense(
    conn: &mut PgConnection,
    key: &OrderKey,
    operation: ExpenseOperation,
    price: &Amount,
    tx_id: i64,
) -> Result<(), LedgerError> {
    sqlx::query(
        r#"
        INSERT INTO deferred_expenses (account_id, service_id, order_id, operation, price, tx_id)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(key.account_id)
    .bind(key.service_id)
    .bind(key.order_id)
    .bind(operation)
    .bind(price.minor_units())
    .bind(tx_id)
    .execute(&mut *conn)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            match operation {
                ExpenseOperation::Reservation => duplicate_order(key),
                ExpenseOperation::Unreservation => already_finalized(key),
            }
        } else {
            LedgerError::from(e)
        }
    })?;

    Ok(())
}

/// Insert a `consolidated_report` row for recognized revenue
pub(crate) async fn insert_revenue(
    conn: &mut PgConnection,
    key: &OrderKey,
    sum: &Amount,
    tx_id: i64,
) -> Result<(), LedgerError> {
    sqlx::query(
        r#"
        INSERT INTO consolidated_report (account_id, service_id, order_id, sum, tx_id)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(key.account_id)
    .bind(key.service_id)
    .bind(key.order_id)
    .bind(sum.minor_units())
    .bind(tx_id)
    .execute(&mut *conn)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            already_finalized(key)
        } else {
            LedgerError::from(e)
        }
    })?;

    Ok(())
}

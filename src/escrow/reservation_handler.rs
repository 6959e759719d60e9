//! Reservation Handler
//!
//! Moves the price of an order from the user's account to the reserve
//! account and records the hold, as one transaction.

use sqlx::{Postgres, Transaction};

use crate::domain::RESERVE_ACCOUNT_ID;
use crate::ledger::{session, Ledger, LedgerError, Session};

use super::repository;
use super::state::duplicate_order;
use super::{EscrowReceipt, ExpenseOperation, OrderKey, ReservationCommand};

/// Handler for order reservations
pub struct ReservationHandler {
    ledger: Ledger,
}

impl ReservationHandler {
    pub fn new(ledger: Ledger) -> Self {
        Self { ledger }
    }

    /// Execute the reservation command
    pub async fn execute(&self, command: ReservationCommand) -> Result<EscrowReceipt, LedgerError> {
        let key = command.key();
        tracing::debug!(
            account_id = key.account_id,
            service_id = key.service_id,
            order_id = key.order_id,
            price = %command.price,
            "Reservation"
        );

        let mut tx = self.ledger.begin().await?;
        let result = self.reserve(&mut tx, &command).await;
        let receipt = match session::finish(tx, result).await {
            Err(LedgerError::SerializationConflict) => {
                return Err(self.classify_conflict(&key).await)
            }
            other => other?,
        };

        tracing::info!(
            account_id = key.account_id,
            service_id = key.service_id,
            order_id = key.order_id,
            tx_id = receipt.tx_id,
            "Order reserved"
        );

        Ok(receipt)
    }

    async fn reserve(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        command: &ReservationCommand,
    ) -> Result<EscrowReceipt, LedgerError> {
        let key = command.key();

        let ids = self
            .ledger
            .transfer(
                key.account_id,
                RESERVE_ACCOUNT_ID,
                &command.price,
                Some(&command.description),
                Session::nested(tx),
            )
            .await?;

        repository::insert_deferred_expense(
            tx,
            &key,
            ExpenseOperation::Reservation,
            &command.price,
            ids.first,
        )
        .await?;

        Ok(EscrowReceipt::new(key, command.price, ids.first))
    }

    /// A conflict with a reservation of the same order that has since
    /// committed is reported as `DuplicateOrder`; any other conflict stays
    /// retryable.
    async fn classify_conflict(&self, key: &OrderKey) -> LedgerError {
        let records = match self.ledger.begin().await {
            Ok(mut tx) => {
                let result = repository::load_order(&mut tx, key).await;
                session::finish(tx, result).await
            }
            Err(err) => Err(err),
        };

        match records {
            Ok(records) if records.reserved.is_some() => {
                tracing::info!(
                    account_id = key.account_id,
                    service_id = key.service_id,
                    order_id = key.order_id,
                    "Concurrent reservation of the same order already committed"
                );
                duplicate_order(key)
            }
            Ok(_) => LedgerError::SerializationConflict,
            Err(err) => {
                tracing::warn!(error = %err, "Failed to classify reservation conflict");
                LedgerError::SerializationConflict
            }
        }
    }
}

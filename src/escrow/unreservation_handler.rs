//! Unreservation Handler
//!
//! Returns the full reserved price from the reserve account to the user.

use sqlx::{Postgres, Transaction};

use crate::domain::RESERVE_ACCOUNT_ID;
use crate::ledger::{session, Ledger, LedgerError, Session};

use super::repository;
use super::{EscrowReceipt, ExpenseOperation, UnreservationCommand};

/// Handler for order refunds
pub struct UnreservationHandler {
    ledger: Ledger,
}

impl UnreservationHandler {
    pub fn new(ledger: Ledger) -> Self {
        Self { ledger }
    }

    /// Execute the unreservation command
    pub async fn execute(&self, command: UnreservationCommand) -> Result<EscrowReceipt, LedgerError> {
        let key = command.key();
        tracing::debug!(
            account_id = key.account_id,
            service_id = key.service_id,
            order_id = key.order_id,
            "Unreservation"
        );

        let mut tx = self.ledger.begin().await?;
        let result = self.refund(&mut tx, &command).await;
        let receipt = session::finish(tx, result).await?;

        tracing::info!(
            account_id = key.account_id,
            service_id = key.service_id,
            order_id = key.order_id,
            amount = %receipt.amount,
            "Reservation refunded"
        );

        Ok(receipt)
    }

    async fn refund(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        command: &UnreservationCommand,
    ) -> Result<EscrowReceipt, LedgerError> {
        let key = command.key();

        let records = repository::load_order(tx, &key).await?;
        let price = records.state().check_refund(&key)?;

        let ids = self
            .ledger
            .transfer(
                RESERVE_ACCOUNT_ID,
                key.account_id,
                &price,
                Some(&command.description),
                Session::nested(tx),
            )
            .await?;

        repository::insert_deferred_expense(
            tx,
            &key,
            ExpenseOperation::Unreservation,
            &price,
            ids.first,
        )
        .await?;

        Ok(EscrowReceipt::new(key, price, ids.first))
    }
}

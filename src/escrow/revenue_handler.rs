//! Revenue Handler
//!
//! Recognizes part or all of a reservation as company revenue: moves the sum
//! from the reserve account to the house account and records it in the
//! consolidated report.

use sqlx::{Postgres, Transaction};

use crate::domain::{HOUSE_ACCOUNT_ID, RESERVE_ACCOUNT_ID};
use crate::ledger::{session, Ledger, LedgerError, Session};

use super::repository;
use super::{EscrowReceipt, RevenueCommand};

/// Handler for revenue recognition
pub struct RevenueHandler {
    ledger: Ledger,
}

impl RevenueHandler {
    pub fn new(ledger: Ledger) -> Self {
        Self { ledger }
    }

    /// Execute the revenue command
    pub async fn execute(&self, command: RevenueCommand) -> Result<EscrowReceipt, LedgerError> {
        let key = command.key();
        tracing::debug!(
            account_id = key.account_id,
            service_id = key.service_id,
            order_id = key.order_id,
            sum = %command.sum,
            "Revenue"
        );

        let mut tx = self.ledger.begin().await?;
        let result = self.recognize(&mut tx, &command).await;
        let receipt = session::finish(tx, result).await?;

        tracing::info!(
            account_id = key.account_id,
            service_id = key.service_id,
            order_id = key.order_id,
            tx_id = receipt.tx_id,
            "Revenue recognized"
        );

        Ok(receipt)
    }

    async fn recognize(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        command: &RevenueCommand,
    ) -> Result<EscrowReceipt, LedgerError> {
        let key = command.key();

        // State before transfer: a refunded order reports AlreadyFinalized,
        // not InsufficientFunds on the reserve account
        let records = repository::load_order(tx, &key).await?;
        records.state().check_revenue(&key, &command.sum)?;

        let ids = self
            .ledger
            .transfer(
                RESERVE_ACCOUNT_ID,
                HOUSE_ACCOUNT_ID,
                &command.sum,
                Some(&command.description),
                Session::nested(tx),
            )
            .await?;

        repository::insert_revenue(tx, &key, &command.sum, ids.first).await?;

        Ok(EscrowReceipt::new(key, command.sum, ids.first))
    }
}

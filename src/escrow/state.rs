//! Escrow order state
//!
//! The state of an order is never stored; it is derived from which
//! bookkeeping rows exist for `(account_id, service_id, order_id)`.

use serde::{Deserialize, Serialize};

use crate::domain::{AccountId, Amount};
use crate::ledger::LedgerError;

/// Identifies one escrowed order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderKey {
    pub account_id: AccountId,
    pub service_id: i64,
    pub order_id: i64,
}

impl OrderKey {
    pub fn new(account_id: AccountId, service_id: i64, order_id: i64) -> Self {
        Self {
            account_id,
            service_id,
            order_id,
        }
    }
}

/// `operation` column of `deferred_expenses`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "expenses_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ExpenseOperation {
    Reservation,
    Unreservation,
}

/// Bookkeeping rows found for an order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderRecords {
    /// Price held by the reservation row, if any
    pub reserved: Option<Amount>,
    /// A consolidated report row exists
    pub recognized: bool,
    /// An unreservation row exists
    pub unreserved: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscrowState {
    None,
    Reserved { price: Amount },
    Recognized { price: Amount },
    Refunded { price: Amount },
}

impl OrderRecords {
    pub fn state(&self) -> EscrowState {
        match self.reserved {
            None => EscrowState::None,
            Some(price) if self.recognized => EscrowState::Recognized { price },
            Some(price) if self.unreserved => EscrowState::Refunded { price },
            Some(price) => EscrowState::Reserved { price },
        }
    }
}

impl EscrowState {
    pub fn is_finalized(&self) -> bool {
        matches!(self, EscrowState::Recognized { .. } | EscrowState::Refunded { .. })
    }

    /// `reserved -> recognized`: validates a revenue of `sum`.
    pub fn check_revenue(&self, key: &OrderKey, sum: &Amount) -> Result<(), LedgerError> {
        let price = match self {
            EscrowState::None => return Err(no_active_reservation(key)),
            EscrowState::Reserved { price }
            | EscrowState::Recognized { price }
            | EscrowState::Refunded { price } => price,
        };

        if sum > price {
            return Err(LedgerError::RevenueExceedsHeld {
                requested: sum.to_decimal(),
                held: price.to_decimal(),
            });
        }

        if self.is_finalized() {
            return Err(already_finalized(key));
        }

        Ok(())
    }

    /// `reserved -> refunded`: returns the held price to give back.
    pub fn check_refund(&self, key: &OrderKey) -> Result<Amount, LedgerError> {
        match self {
            EscrowState::None => Err(no_active_reservation(key)),
            EscrowState::Reserved { price } => Ok(*price),
            EscrowState::Recognized { .. } | EscrowState::Refunded { .. } => {
                Err(already_finalized(key))
            }
        }
    }
}

fn no_active_reservation(key: &OrderKey) -> LedgerError {
    LedgerError::NoActiveReservation {
        account_id: key.account_id,
        service_id: key.service_id,
        order_id: key.order_id,
    }
}

pub(crate) fn already_finalized(key: &OrderKey) -> LedgerError {
    LedgerError::AlreadyFinalized {
        account_id: key.account_id,
        service_id: key.service_id,
        order_id: key.order_id,
    }
}

pub(crate) fn duplicate_order(key: &OrderKey) -> LedgerError {
    LedgerError::DuplicateOrder {
        account_id: key.account_id,
        service_id: key.service_id,
        order_id: key.order_id,
    }
}

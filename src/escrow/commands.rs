//! Escrow command definitions

use serde::{Deserialize, Serialize};

use crate::domain::{AccountId, Amount};

use super::OrderKey;

// =========================================================================
// Reservation
// =========================================================================

/// Hold `price` from the user's account on the reserve account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationCommand {
    pub account_id: AccountId,
    pub service_id: i64,
    pub order_id: i64,
    pub price: Amount,
    pub description: String,
}

impl ReservationCommand {
    pub fn new(account_id: AccountId, service_id: i64, order_id: i64, price: Amount) -> Self {
        Self {
            account_id,
            service_id,
            order_id,
            price,
            description: format!(
                "Order number {order_id}; Purchase of service {service_id} by user {account_id} in the price of {price}"
            ),
        }
    }

    pub fn with_description(mut self, description: String) -> Self {
        self.description = description;
        self
    }

    pub fn key(&self) -> OrderKey {
        OrderKey::new(self.account_id, self.service_id, self.order_id)
    }
}

// =========================================================================
// Revenue
// =========================================================================

/// Recognize `sum` of a reservation as company revenue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevenueCommand {
    pub account_id: AccountId,
    pub service_id: i64,
    pub order_id: i64,
    pub sum: Amount,
    pub description: String,
}

impl RevenueCommand {
    pub fn new(account_id: AccountId, service_id: i64, order_id: i64, sum: Amount) -> Self {
        Self {
            account_id,
            service_id,
            order_id,
            sum,
            description: format!(
                "Order number {order_id}; Transferring money for the service {service_id} from a reserve account to a company account in the sum {sum}"
            ),
        }
    }

    pub fn with_description(mut self, description: String) -> Self {
        self.description = description;
        self
    }

    pub fn key(&self) -> OrderKey {
        OrderKey::new(self.account_id, self.service_id, self.order_id)
    }
}

// =========================================================================
// Unreservation
// =========================================================================

/// Refund the full reserved price to the user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnreservationCommand {
    pub account_id: AccountId,
    pub service_id: i64,
    pub order_id: i64,
    pub description: String,
}

impl UnreservationCommand {
    pub fn new(account_id: AccountId, service_id: i64, order_id: i64) -> Self {
        Self {
            account_id,
            service_id,
            order_id,
            description: format!(
                "Order number {order_id}; Refund for the service {service_id} by user {account_id}"
            ),
        }
    }

    pub fn with_description(mut self, description: String) -> Self {
        self.description = description;
        self
    }

    pub fn key(&self) -> OrderKey {
        OrderKey::new(self.account_id, self.service_id, self.order_id)
    }
}

/// Result of a committed escrow step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscrowReceipt {
    pub account_id: AccountId,
    pub service_id: i64,
    pub order_id: i64,
    /// Amount moved by this step
    pub amount: Amount,
    /// Posting the bookkeeping row points at
    pub tx_id: i64,
}

impl EscrowReceipt {
    pub(crate) fn new(key: OrderKey, amount: Amount, tx_id: i64) -> Self {
        Self {
            account_id: key.account_id,
            service_id: key.service_id,
            order_id: key.order_id,
            amount,
            tx_id,
        }
    }
}

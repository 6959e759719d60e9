//! Postings
//!
//! A posting is one signed entry against one account. Every ledger operation
//! is expressed as a `PostingPair` whose two legs cancel out.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::Amount;

/// Account identifier as stored in the journal
pub type AccountId = i64;

/// House (cash-book) account: the platform's side of deposits, withdrawals
/// and recognized revenue.
pub const HOUSE_ACCOUNT_ID: AccountId = 0;

/// Reserve account: holds escrowed funds between reservation and
/// revenue recognition or unreservation.
pub const RESERVE_ACCOUNT_ID: AccountId = 1;

/// Returns true for accounts owned by the platform itself.
pub fn is_system_account(account_id: AccountId) -> bool {
    account_id == HOUSE_ACCOUNT_ID || account_id == RESERVE_ACCOUNT_ID
}

/// Kind of operation that produced a posting (`cash_book` column)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "operation_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Deposit,
    Withdrawal,
    Transfer,
}

/// One journal row
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Posting {
    pub id: i64,
    pub account_id: AccountId,
    #[sqlx(rename = "cash_book")]
    pub operation_kind: OperationKind,
    pub accounting_period: DateTime<Utc>,
    /// Signed minor units: negative debits `account_id`, positive credits it
    pub amount: i64,
    pub date: DateTime<Utc>,
    pub addressee: Option<AccountId>,
    pub description: Option<String>,
}

/// A posting that has not been written yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leg {
    pub account_id: AccountId,
    pub amount: i64,
    pub addressee: Option<AccountId>,
}

/// The two balancing legs of a single operation. `first` is the leg of the
/// account the operation was requested for (the user, or the sender of a
/// transfer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostingPair {
    pub kind: OperationKind,
    pub first: Leg,
    pub second: Leg,
}

impl PostingPair {
    /// `+amount` to the user, `-amount` to the house account
    pub fn deposit(account_id: AccountId, amount: &Amount) -> Self {
        let value = amount.minor_units();
        Self {
            kind: OperationKind::Deposit,
            first: Leg { account_id, amount: value, addressee: None },
            second: Leg { account_id: HOUSE_ACCOUNT_ID, amount: -value, addressee: None },
        }
    }

    /// `-amount` to the user, `+amount` to the house account
    pub fn withdrawal(account_id: AccountId, amount: &Amount) -> Self {
        let value = amount.minor_units();
        Self {
            kind: OperationKind::Withdrawal,
            first: Leg { account_id, amount: -value, addressee: None },
            second: Leg { account_id: HOUSE_ACCOUNT_ID, amount: value, addressee: None },
        }
    }

    /// `-amount` to the sender, `+amount` to the recipient; each leg names the
    /// other side as addressee.
    pub fn transfer(sender: AccountId, recipient: AccountId, amount: &Amount) -> Self {
        let value = amount.minor_units();
        Self {
            kind: OperationKind::Transfer,
            first: Leg { account_id: sender, amount: -value, addressee: Some(recipient) },
            second: Leg { account_id: recipient, amount: value, addressee: Some(sender) },
        }
    }

    /// Sum of both legs; zero for every pair built by the constructors.
    pub fn net(&self) -> i64 {
        self.first.amount + self.second.amount
    }
}

/// Sort order of an account history listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderBy {
    Amount,
    #[default]
    Date,
}

impl OrderBy {
    /// Column the listing is ordered by. Ties fall back to posting id.
    pub(crate) fn column(&self) -> &'static str {
        match self {
            OrderBy::Amount => "amount",
            OrderBy::Date => "date",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("wrong value of order type: {0:?} (expected \"amount\" or \"date\")")]
pub struct BadOrderType(pub String);

impl FromStr for OrderBy {
    type Err = BadOrderType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "amount" => Ok(OrderBy::Amount),
            "date" => Ok(OrderBy::Date),
            other => Err(BadOrderType(other.to_string())),
        }
    }
}

impl fmt::Display for OrderBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn amount(minor: i64) -> Amount {
        Amount::from_minor(minor).unwrap()
    }

    #[test]
    fn test_deposit_legs() {
        let pair = PostingPair::deposit(7, &amount(10000));
        assert_eq!(pair.kind, OperationKind::Deposit);
        assert_eq!(pair.first, Leg { account_id: 7, amount: 10000, addressee: None });
        assert_eq!(pair.second.account_id, HOUSE_ACCOUNT_ID);
        assert_eq!(pair.second.amount, -10000);
    }

    #[test]
    fn test_withdrawal_legs_mirror_deposit() {
        let deposit = PostingPair::deposit(7, &amount(250));
        let withdrawal = PostingPair::withdrawal(7, &amount(250));
        assert_eq!(withdrawal.first.amount, -deposit.first.amount);
        assert_eq!(withdrawal.second.amount, -deposit.second.amount);
    }

    #[test]
    fn test_transfer_legs_name_counterparty() {
        let pair = PostingPair::transfer(2, RESERVE_ACCOUNT_ID, &amount(500));
        assert_eq!(pair.first, Leg { account_id: 2, amount: -500, addressee: Some(1) });
        assert_eq!(pair.second, Leg { account_id: 1, amount: 500, addressee: Some(2) });
    }

    #[test]
    fn test_every_pair_nets_to_zero() {
        for minor in [1, 99, 10000, 123_456_789] {
            let a = amount(minor);
            assert_eq!(PostingPair::deposit(3, &a).net(), 0);
            assert_eq!(PostingPair::withdrawal(3, &a).net(), 0);
            assert_eq!(PostingPair::transfer(3, 4, &a).net(), 0);
        }
    }

    #[test]
    fn test_order_by_parse() {
        assert_eq!("amount".parse::<OrderBy>().unwrap(), OrderBy::Amount);
        assert_eq!("date".parse::<OrderBy>().unwrap(), OrderBy::Date);
        assert_eq!("account_id".parse::<OrderBy>(), Err(BadOrderType("account_id".into())));
    }

    #[test]
    fn test_order_by_deserialize() {
        let order: OrderBy = serde_json::from_str("\"amount\"").unwrap();
        assert_eq!(order, OrderBy::Amount);
        assert!(serde_json::from_str::<OrderBy>("\"id\"").is_err());
    }

    #[test]
    fn test_system_accounts() {
        assert!(is_system_account(HOUSE_ACCOUNT_ID));
        assert!(is_system_account(RESERVE_ACCOUNT_ID));
        assert!(!is_system_account(2));
    }
}

//! Posting Journal
//!
//! Deposits, withdrawals and transfers. Each writes exactly two balancing
//! postings inside one transaction and returns the ids of both legs.

use sqlx::{PgConnection, PgPool, Postgres, Transaction};

use crate::domain::{AccountId, Amount, Balance, Leg, PostingPair};

use super::rollup;
use super::session::{self, Session};
use super::LedgerError;

/// Ids of the two postings written by one operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostingIds {
    /// Leg of the requesting account (user, or sender of a transfer)
    pub first: i64,
    /// Counterparty leg (house account, or recipient of a transfer)
    pub second: i64,
}

/// Handle to the ledger core. Cheap to clone; owns a pool handle.
#[derive(Debug, Clone)]
pub struct Ledger {
    pool: PgPool,
}

impl Ledger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Begin a top-level SERIALIZABLE transaction for a composed workflow.
    pub async fn begin(&self) -> Result<Transaction<'static, Postgres>, LedgerError> {
        session::begin_serializable(&self.pool).await
    }

    // =========================================================================
    // ReadBalance
    // =========================================================================

    /// Current balance of an account
    pub async fn balance(&self, account_id: AccountId) -> Result<Balance, LedgerError> {
        let mut tx = session::begin(&self.pool, Session::New).await?;
        let result = rollup::current_balance(&mut tx, account_id).await;
        session::finish(tx, result).await
    }

    // =========================================================================
    // Deposit
    // =========================================================================

    /// Credit `account_id` from the house account
    pub async fn deposit(
        &self,
        account_id: AccountId,
        amount: &Amount,
    ) -> Result<PostingIds, LedgerError> {
        tracing::debug!(account_id, %amount, "Deposit");

        let pair = PostingPair::deposit(account_id, amount);
        let mut tx = session::begin(&self.pool, Session::New).await?;
        let result = write_pair(&mut tx, &pair, None).await;
        session::finish(tx, result).await
    }

    // =========================================================================
    // Withdraw
    // =========================================================================

    /// Debit `account_id` to the house account
    pub async fn withdraw(
        &self,
        account_id: AccountId,
        amount: &Amount,
        description: Option<&str>,
    ) -> Result<PostingIds, LedgerError> {
        tracing::debug!(account_id, %amount, "Withdrawal");

        let pair = PostingPair::withdrawal(account_id, amount);
        let mut tx = session::begin(&self.pool, Session::New).await?;
        let result = debit_checked(&mut tx, &pair, amount, description).await;
        session::finish(tx, result).await
    }

    // =========================================================================
    // Transfer
    // =========================================================================

    /// Move `amount` from `sender` to `recipient`.
    ///
    /// With `Session::Nested` the transfer runs as a savepoint of the caller's
    /// transaction and only becomes durable when the caller commits.
    pub async fn transfer(
        &self,
        sender: AccountId,
        recipient: AccountId,
        amount: &Amount,
        description: Option<&str>,
        session: Session<'_>,
    ) -> Result<PostingIds, LedgerError> {
        tracing::debug!(sender, recipient, %amount, nested = session.is_nested(), "Transfer");

        let pair = PostingPair::transfer(sender, recipient, amount);
        let mut tx = session::begin(&self.pool, session).await?;
        let result = debit_checked(&mut tx, &pair, amount, description).await;
        session::finish(tx, result).await
    }
}

/// Check the debited account covers `amount`, then write both legs.
/// The balance read and the writes share one transaction.
async fn debit_checked(
    conn: &mut PgConnection,
    pair: &PostingPair,
    amount: &Amount,
    description: Option<&str>,
) -> Result<PostingIds, LedgerError> {
    let debited = pair.first.account_id;
    let balance = rollup::current_balance(&mut *conn, debited).await?;

    if !balance.is_sufficient_for(amount) {
        tracing::info!(
            account_id = debited,
            required = %amount,
            available = %balance,
            "Insufficient funds"
        );
        return Err(LedgerError::InsufficientFunds {
            account_id: debited,
            required: amount.to_decimal(),
            available: balance.to_decimal(),
        });
    }

    write_pair(conn, pair, description).await
}

/// Insert both legs, then fold each touched account's checkpoint.
///
/// Every writer updates the checkpoint row of every account it posts to, so a
/// concurrent fold of that account is a write-write conflict and one side
/// aborts. Otherwise a reader could move `last_tx_id` past a posting whose
/// transaction commits later.
async fn write_pair(
    conn: &mut PgConnection,
    pair: &PostingPair,
    description: Option<&str>,
) -> Result<PostingIds, LedgerError> {
    debug_assert_eq!(pair.net(), 0);

    let first = insert_leg(&mut *conn, pair, &pair.first, description).await?;
    let second = insert_leg(&mut *conn, pair, &pair.second, description).await?;

    for leg in [&pair.first, &pair.second] {
        rollup::current_balance(&mut *conn, leg.account_id).await?;
    }

    Ok(PostingIds { first, second })
}

async fn insert_leg(
    conn: &mut PgConnection,
    pair: &PostingPair,
    leg: &Leg,
    description: Option<&str>,
) -> Result<i64, LedgerError> {
    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO posting (account_id, cash_book, accounting_period, amount, date, addressee, description)
        VALUES ($1, $2, date_trunc('month', NOW()), $3, NOW(), $4, $5)
        RETURNING id
        "#,
    )
    .bind(leg.account_id)
    .bind(pair.kind)
    .bind(leg.amount)
    .bind(leg.addressee)
    .bind(description)
    .fetch_one(&mut *conn)
    .await?;

    Ok(id)
}

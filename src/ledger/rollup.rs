//! Balance rollup
//!
//! Balances are derived from the journal. Each account has a checkpoint row
//! `(balance, last_tx_id)` in `balances`; a read folds only the postings
//! written after `last_tx_id` and moves the checkpoint forward. Writers fold
//! the accounts they post to as well, which makes a concurrent fold of the
//! same account a write-write conflict.

use sqlx::PgConnection;

use crate::domain::{AccountId, Balance};

use super::LedgerError;

/// Checkpoint row
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::FromRow)]
pub struct Checkpoint {
    pub account_id: AccountId,
    pub balance: i64,
    pub last_tx_id: i64,
}

/// Postings newer than a checkpoint, summarized
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::FromRow)]
pub(crate) struct PendingPostings {
    pub count: i64,
    pub sum: i64,
    pub max_id: Option<i64>,
}

impl Checkpoint {
    fn empty(account_id: AccountId) -> Self {
        Self {
            account_id,
            balance: 0,
            last_tx_id: 0,
        }
    }

    /// Move the checkpoint past `pending`. Returns `None` when there is
    /// nothing to fold.
    pub(crate) fn advance(&self, pending: &PendingPostings) -> Option<Checkpoint> {
        let max_id = pending.max_id?;
        Some(Checkpoint {
            account_id: self.account_id,
            balance: self.balance + pending.sum,
            last_tx_id: max_id.max(self.last_tx_id),
        })
    }
}

/// Current balance of `account_id`, read inside the caller's transaction.
///
/// Fails with `AccountNotFound` when the account has never been posted to.
pub async fn current_balance(
    conn: &mut PgConnection,
    account_id: AccountId,
) -> Result<Balance, LedgerError> {
    let stored: Option<Checkpoint> = sqlx::query_as(
        r#"
        SELECT account_id, balance, last_tx_id
        FROM balances
        WHERE account_id = $1
        "#,
    )
    .bind(account_id)
    .fetch_optional(&mut *conn)
    .await?;

    let checkpoint = stored.unwrap_or_else(|| Checkpoint::empty(account_id));

    let pending: PendingPostings = sqlx::query_as(
        r#"
        SELECT COUNT(*) AS count,
               COALESCE(SUM(amount), 0)::BIGINT AS sum,
               MAX(id) AS max_id
        FROM posting
        WHERE account_id = $1 AND id > $2
        "#,
    )
    .bind(account_id)
    .bind(checkpoint.last_tx_id)
    .fetch_one(&mut *conn)
    .await?;

    let Some(next) = checkpoint.advance(&pending) else {
        if stored.is_none() {
            return Err(LedgerError::AccountNotFound(account_id));
        }
        return Ok(Balance::from_minor(checkpoint.balance));
    };

    sqlx::query(
        r#"
        INSERT INTO balances (account_id, balance, last_tx_id)
        VALUES ($1, $2, $3)
        ON CONFLICT (account_id)
        DO UPDATE SET balance = EXCLUDED.balance, last_tx_id = EXCLUDED.last_tx_id
        "#,
    )
    .bind(next.account_id)
    .bind(next.balance)
    .bind(next.last_tx_id)
    .execute(&mut *conn)
    .await?;

    tracing::debug!(
        account_id,
        folded = pending.count,
        last_tx_id = next.last_tx_id,
        balance = next.balance,
        "Balance checkpoint advanced"
    );

    Ok(Balance::from_minor(next.balance))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_folds_pending_sum() {
        let checkpoint = Checkpoint { account_id: 2, balance: 10000, last_tx_id: 4 };
        let pending = PendingPostings { count: 2, sum: -2500, max_id: Some(9) };

        let next = checkpoint.advance(&pending).unwrap();
        assert_eq!(next, Checkpoint { account_id: 2, balance: 7500, last_tx_id: 9 });
    }

    #[test]
    fn test_advance_without_pending_postings() {
        let checkpoint = Checkpoint { account_id: 2, balance: 10000, last_tx_id: 4 };
        let pending = PendingPostings { count: 0, sum: 0, max_id: None };

        assert_eq!(checkpoint.advance(&pending), None);
    }

    #[test]
    fn test_advance_from_empty_checkpoint() {
        let pending = PendingPostings { count: 1, sum: 500, max_id: Some(1) };
        let next = Checkpoint::empty(3).advance(&pending).unwrap();
        assert_eq!(next.balance, 500);
        assert_eq!(next.last_tx_id, 1);
    }

    #[test]
    fn test_repeated_folds_match_single_fold() {
        // Folding in two steps must equal folding everything at once
        let start = Checkpoint::empty(5);
        let first = PendingPostings { count: 2, sum: 300, max_id: Some(2) };
        let second = PendingPostings { count: 1, sum: -100, max_id: Some(7) };
        let all = PendingPostings { count: 3, sum: 200, max_id: Some(7) };

        let stepwise = start.advance(&first).unwrap().advance(&second).unwrap();
        assert_eq!(stepwise, start.advance(&all).unwrap());
    }
}

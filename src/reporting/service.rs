//! Reporting Service
//!
//! Reads the posting journal and the consolidated report directly; nothing
//! here writes.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};

use crate::domain::amount::MINOR_SCALE;
use crate::domain::{AccountId, OrderBy, Posting};
use crate::ledger::{session, LedgerError, Session};

/// Upper bound on a single history page
pub const MAX_HISTORY_LIMIT: i64 = 1000;

/// Revenue recognized for one service in a month
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRow {
    pub service_id: i64,
    pub total_revenue: Decimal,
}

#[derive(sqlx::FromRow)]
struct ReportRecord {
    service_id: i64,
    total: i64,
}

/// Reporting Service for history and revenue queries
#[derive(Debug, Clone)]
pub struct ReportingService {
    pool: PgPool,
}

impl ReportingService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    // HistoryList
    // =========================================================================

    /// One page of an account's postings, ordered by `order_by` then id.
    ///
    /// Fails with `NoHistory` only when the account has no postings at all;
    /// an offset past the end yields an empty page.
    pub async fn history_list(
        &self,
        account_id: AccountId,
        order_by: OrderBy,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Posting>, LedgerError> {
        let mut tx = session::begin(&self.pool, Session::New).await?;
        let result = history_page(&mut tx, account_id, order_by, limit, offset).await;
        let postings = session::finish(tx, result).await?;

        tracing::debug!(
            account_id,
            order_by = %order_by,
            limit,
            offset,
            returned = postings.len(),
            "History listed"
        );

        Ok(postings)
    }

    // =========================================================================
    // MonthlyReport
    // =========================================================================

    /// Revenue per service for postings dated in `year`-`month`, ordered by
    /// service id.
    pub async fn monthly_report(&self, year: i32, month: u32) -> Result<Vec<ReportRow>, LedgerError> {
        let Some((from, to)) = month_bounds(year, month) else {
            return Err(LedgerError::NoReportRecords { year, month });
        };

        let records: Vec<ReportRecord> = sqlx::query_as(
            r#"
            SELECT cr.service_id, SUM(cr.sum)::BIGINT AS total
            FROM consolidated_report cr
            JOIN posting p ON p.id = cr.tx_id
            WHERE p.date >= $1 AND p.date < $2
            GROUP BY cr.service_id
            ORDER BY cr.service_id
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        if records.is_empty() {
            return Err(LedgerError::NoReportRecords { year, month });
        }

        tracing::debug!(year, month, services = records.len(), "Monthly report built");

        Ok(records
            .into_iter()
            .map(|r| ReportRow {
                service_id: r.service_id,
                total_revenue: Decimal::new(r.total, MINOR_SCALE),
            })
            .collect())
    }
}

async fn history_page(
    conn: &mut PgConnection,
    account_id: AccountId,
    order_by: OrderBy,
    limit: i64,
    offset: i64,
) -> Result<Vec<Posting>, LedgerError> {
    let has_postings: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM posting WHERE account_id = $1)")
            .bind(account_id)
            .fetch_one(&mut *conn)
            .await?;

    if !has_postings {
        return Err(LedgerError::NoHistory(account_id));
    }

    // Column name comes from a closed enum, never from input
    let sql = format!(
        r#"
        SELECT id, account_id, cash_book, accounting_period, amount, date, addressee, description
        FROM posting
        WHERE account_id = $1
        ORDER BY {} ASC, id ASC
        LIMIT $2 OFFSET $3
        "#,
        order_by.column()
    );

    let postings = sqlx::query_as::<_, Posting>(&sql)
        .bind(account_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut *conn)
        .await?;

    Ok(postings)
}

/// `[first instant of the month, first instant of the next month)` in UTC
fn month_bounds(year: i32, month: u32) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let start = NaiveDate::from_ymd_opt(year, month, 1)?;
    let end = if month == 12 {
        NaiveDate::from_ymd_opt(year.checked_add(1)?, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };

    Some((
        start.and_hms_opt(0, 0, 0)?.and_utc(),
        end.and_hms_opt(0, 0, 0)?.and_utc(),
    ))
}

/// Render report rows as CSV with a `service_id,total_revenue` header.
pub fn render_csv(rows: &[ReportRow]) -> String {
    let mut out = String::from("service_id,total_revenue\n");
    for row in rows {
        out.push_str(&format!("{},{:.2}\n", row.service_id, row.total_revenue));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;
    use rust_decimal_macros::dec;

    #[test]
    fn test_month_bounds() {
        let (from, to) = month_bounds(2024, 2).unwrap();
        assert_eq!((from.year(), from.month(), from.day()), (2024, 2, 1));
        assert_eq!((to.year(), to.month(), to.day()), (2024, 3, 1));
    }

    #[test]
    fn test_month_bounds_december_rolls_year() {
        let (_, to) = month_bounds(2023, 12).unwrap();
        assert_eq!((to.year(), to.month()), (2024, 1));
    }

    #[test]
    fn test_month_bounds_rejects_invalid_month() {
        assert!(month_bounds(2024, 0).is_none());
        assert!(month_bounds(2024, 13).is_none());
    }

    #[test]
    fn test_render_csv() {
        let rows = vec![
            ReportRow { service_id: 1, total_revenue: dec!(150) },
            ReportRow { service_id: 4, total_revenue: dec!(0.5) },
        ];
        assert_eq!(
            render_csv(&rows),
            "service_id,total_revenue\n1,150.00\n4,0.50\n"
        );
    }
}

//! Common test utilities

#![allow(dead_code)]

use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tokio::sync::{Mutex, MutexGuard};

use escrow_ledger::{db, Amount};

/// Tests in one binary share a database; each holds this while it runs.
static DB_LOCK: Mutex<()> = Mutex::const_new(());

pub struct TestDb {
    pub pool: PgPool,
    _guard: MutexGuard<'static, ()>,
}

/// Setup test database - apply migrations and truncate all ledger tables
pub async fn setup_test_db() -> TestDb {
    let guard = DB_LOCK.lock().await;

    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL")
        .expect("DATABASE_URL must be set for tests");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await
        .expect("Failed to connect to DB");

    db::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");

    sqlx::query(
        "TRUNCATE TABLE consolidated_report, deferred_expenses, balances, posting RESTART IDENTITY CASCADE",
    )
    .execute(&pool)
    .await
    .expect("Failed to clean up DB");

    TestDb { pool, _guard: guard }
}

pub fn amount(value: Decimal) -> Amount {
    Amount::new(value).expect("valid test amount")
}

/// Sum of all postings ever written
pub async fn journal_total(pool: &PgPool) -> i64 {
    sqlx::query_scalar("SELECT COALESCE(SUM(amount), 0)::BIGINT FROM posting")
        .fetch_one(pool)
        .await
        .unwrap()
}

/// Sum of one account's postings, computed without the checkpoint
pub async fn posted_sum(pool: &PgPool, account_id: i64) -> i64 {
    sqlx::query_scalar("SELECT COALESCE(SUM(amount), 0)::BIGINT FROM posting WHERE account_id = $1")
        .bind(account_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

pub async fn count_rows(pool: &PgPool, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(pool)
        .await
        .unwrap()
}

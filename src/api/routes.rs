//! API Routes
//!
//! HTTP endpoint definitions. Requests are validated here; the ledger and
//! escrow handlers only ever see well-formed input.

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::db;
use crate::domain::amount::MINOR_SCALE;
use crate::domain::{is_system_account, AccountId, Amount, OperationKind, OrderBy, Posting};
use crate::error::AppError;
use crate::escrow::{
    EscrowReceipt, ReservationCommand, ReservationHandler, RevenueCommand, RevenueHandler,
    UnreservationCommand, UnreservationHandler,
};
use crate::ledger::{Ledger, PostingIds, Session};
use crate::reporting::{render_csv, ReportRow, ReportingService, MAX_HISTORY_LIMIT};

/// Page size used when the caller gives none
pub const DEFAULT_HISTORY_LIMIT: i64 = 100;

// =========================================================================
// Request/Response types
// =========================================================================

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub account_id: AccountId,
    pub balance: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct DepositRequest {
    pub account_id: AccountId,
    pub amount: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct WithdrawalRequest {
    pub account_id: AccountId,
    pub amount: Decimal,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    pub sender_id: AccountId,
    pub recipient_id: AccountId,
    pub amount: Decimal,
    #[serde(default)]
    pub description: Option<String>,
}

/// Ids of the two postings written by a deposit, withdrawal or transfer
#[derive(Debug, Serialize)]
pub struct PostingResponse {
    pub tx_id: i64,
    pub counterparty_tx_id: i64,
    pub amount: Decimal,
}

impl PostingResponse {
    fn new(ids: PostingIds, amount: &Amount) -> Self {
        Self {
            tx_id: ids.first,
            counterparty_tx_id: ids.second,
            amount: amount.to_decimal(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ReservationRequest {
    pub account_id: AccountId,
    pub service_id: i64,
    pub order_id: i64,
    pub price: Decimal,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RevenueRequest {
    pub account_id: AccountId,
    pub service_id: i64,
    pub order_id: i64,
    pub sum: Decimal,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UnreservationRequest {
    pub account_id: AccountId,
    pub service_id: i64,
    pub order_id: i64,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EscrowResponse {
    pub account_id: AccountId,
    pub service_id: i64,
    pub order_id: i64,
    pub amount: Decimal,
    pub tx_id: i64,
}

impl From<EscrowReceipt> for EscrowResponse {
    fn from(receipt: EscrowReceipt) -> Self {
        Self {
            account_id: receipt.account_id,
            service_id: receipt.service_id,
            order_id: receipt.order_id,
            amount: receipt.amount.to_decimal(),
            tx_id: receipt.tx_id,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub order: Option<String>,
    #[serde(default = "default_history_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_history_limit() -> i64 {
    DEFAULT_HISTORY_LIMIT
}

#[derive(Debug, Serialize)]
pub struct HistoryEntry {
    pub id: i64,
    pub operation: OperationKind,
    /// Signed: negative for debits
    pub amount: Decimal,
    pub date: DateTime<Utc>,
    pub addressee: Option<AccountId>,
    pub description: Option<String>,
}

impl From<Posting> for HistoryEntry {
    fn from(posting: Posting) -> Self {
        Self {
            id: posting.id,
            operation: posting.operation_kind,
            amount: Decimal::new(posting.amount, MINOR_SCALE),
            date: posting.date,
            addressee: posting.addressee,
            description: posting.description,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    pub year: i32,
    pub month: u32,
    #[serde(default)]
    pub format: Option<String>,
}

// =========================================================================
// Router
// =========================================================================

/// Create the API router
pub fn create_router() -> Router<PgPool> {
    Router::new()
        .route("/health", get(health_check))
        // Ledger
        .route("/accounts/:account_id/balance", get(get_balance))
        .route("/accounts/:account_id/history", get(get_history))
        .route("/deposit", post(deposit))
        .route("/withdrawal", post(withdrawal))
        .route("/transfer", post(transfer))
        // Escrow
        .route("/reservation", post(reservation))
        .route("/revenue", post(revenue))
        .route("/unreservation", post(unreservation))
        // Reports
        .route("/reports/monthly", get(monthly_report))
}

// =========================================================================
// Validation
// =========================================================================

fn validate_account(account_id: AccountId) -> Result<(), AppError> {
    if account_id <= 0 {
        return Err(AppError::InvalidRequest(format!(
            "account id must be positive (got {account_id})"
        )));
    }
    Ok(())
}

/// Escrow operations are never made on behalf of a system account
fn validate_user_account(account_id: AccountId) -> Result<(), AppError> {
    if account_id < 0 || is_system_account(account_id) {
        return Err(AppError::InvalidRequest(format!(
            "account {account_id} cannot hold reservations"
        )));
    }
    Ok(())
}

fn validate_order(service_id: i64, order_id: i64) -> Result<(), AppError> {
    if service_id <= 0 {
        return Err(AppError::InvalidRequest(format!(
            "service id must be positive (got {service_id})"
        )));
    }
    if order_id <= 0 {
        return Err(AppError::InvalidRequest(format!(
            "order id must be positive (got {order_id})"
        )));
    }
    Ok(())
}

fn validate_page(limit: i64, offset: i64) -> Result<(), AppError> {
    if !(1..=MAX_HISTORY_LIMIT).contains(&limit) {
        return Err(AppError::InvalidRequest(format!(
            "limit must be between 1 and {MAX_HISTORY_LIMIT} (got {limit})"
        )));
    }
    if offset < 0 {
        return Err(AppError::InvalidRequest(format!(
            "offset must not be negative (got {offset})"
        )));
    }
    Ok(())
}

// =========================================================================
// GET /health
// =========================================================================

async fn health_check(State(pool): State<PgPool>) -> Result<&'static str, AppError> {
    db::verify_connection(&pool).await?;
    Ok("OK")
}

// =========================================================================
// GET /accounts/:account_id/balance
// =========================================================================

async fn get_balance(
    State(pool): State<PgPool>,
    Path(account_id): Path<AccountId>,
) -> Result<Json<BalanceResponse>, AppError> {
    validate_account(account_id)?;

    let balance = Ledger::new(pool).balance(account_id).await?;

    Ok(Json(BalanceResponse {
        account_id,
        balance: balance.to_decimal(),
    }))
}

// =========================================================================
// POST /deposit
// =========================================================================

async fn deposit(
    State(pool): State<PgPool>,
    Json(request): Json<DepositRequest>,
) -> Result<(StatusCode, Json<PostingResponse>), AppError> {
    validate_account(request.account_id)?;
    let amount = Amount::new(request.amount)?;

    let ids = Ledger::new(pool).deposit(request.account_id, &amount).await?;

    Ok((StatusCode::CREATED, Json(PostingResponse::new(ids, &amount))))
}

// =========================================================================
// POST /withdrawal
// =========================================================================

async fn withdrawal(
    State(pool): State<PgPool>,
    Json(request): Json<WithdrawalRequest>,
) -> Result<(StatusCode, Json<PostingResponse>), AppError> {
    validate_account(request.account_id)?;
    let amount = Amount::new(request.amount)?;

    let ids = Ledger::new(pool)
        .withdraw(request.account_id, &amount, request.description.as_deref())
        .await?;

    Ok((StatusCode::CREATED, Json(PostingResponse::new(ids, &amount))))
}

// =========================================================================
// POST /transfer
// =========================================================================

async fn transfer(
    State(pool): State<PgPool>,
    Json(request): Json<TransferRequest>,
) -> Result<(StatusCode, Json<PostingResponse>), AppError> {
    validate_account(request.sender_id)?;
    validate_account(request.recipient_id)?;
    if request.sender_id == request.recipient_id {
        return Err(AppError::InvalidRequest(
            "Cannot transfer to the same account".to_string(),
        ));
    }
    let amount = Amount::new(request.amount)?;

    let ids = Ledger::new(pool)
        .transfer(
            request.sender_id,
            request.recipient_id,
            &amount,
            request.description.as_deref(),
            Session::New,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(PostingResponse::new(ids, &amount))))
}

// =========================================================================
// POST /reservation
// =========================================================================

async fn reservation(
    State(pool): State<PgPool>,
    Json(request): Json<ReservationRequest>,
) -> Result<(StatusCode, Json<EscrowResponse>), AppError> {
    validate_user_account(request.account_id)?;
    validate_order(request.service_id, request.order_id)?;
    let price = Amount::new(request.price)?;

    let command =
        ReservationCommand::new(request.account_id, request.service_id, request.order_id, price);
    let command = match request.description {
        Some(description) => command.with_description(description),
        None => command,
    };

    let receipt = ReservationHandler::new(Ledger::new(pool)).execute(command).await?;

    Ok((StatusCode::CREATED, Json(receipt.into())))
}

// =========================================================================
// POST /revenue
// =========================================================================

async fn revenue(
    State(pool): State<PgPool>,
    Json(request): Json<RevenueRequest>,
) -> Result<(StatusCode, Json<EscrowResponse>), AppError> {
    validate_user_account(request.account_id)?;
    validate_order(request.service_id, request.order_id)?;
    let sum = Amount::new(request.sum)?;

    let command =
        RevenueCommand::new(request.account_id, request.service_id, request.order_id, sum);
    let command = match request.description {
        Some(description) => command.with_description(description),
        None => command,
    };

    let receipt = RevenueHandler::new(Ledger::new(pool)).execute(command).await?;

    Ok((StatusCode::CREATED, Json(receipt.into())))
}

// =========================================================================
// POST /unreservation
// =========================================================================

async fn unreservation(
    State(pool): State<PgPool>,
    Json(request): Json<UnreservationRequest>,
) -> Result<(StatusCode, Json<EscrowResponse>), AppError> {
    validate_user_account(request.account_id)?;
    validate_order(request.service_id, request.order_id)?;

    let command =
        UnreservationCommand::new(request.account_id, request.service_id, request.order_id);
    let command = match request.description {
        Some(description) => command.with_description(description),
        None => command,
    };

    let receipt = UnreservationHandler::new(Ledger::new(pool)).execute(command).await?;

    Ok((StatusCode::CREATED, Json(receipt.into())))
}

// =========================================================================
// GET /accounts/:account_id/history
// =========================================================================

async fn get_history(
    State(pool): State<PgPool>,
    Path(account_id): Path<AccountId>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<HistoryEntry>>, AppError> {
    validate_account(account_id)?;
    validate_page(query.limit, query.offset)?;
    let order_by: OrderBy = match query.order.as_deref() {
        Some(order) => order.parse()?,
        None => OrderBy::default(),
    };

    let postings = ReportingService::new(pool)
        .history_list(account_id, order_by, query.limit, query.offset)
        .await?;

    Ok(Json(postings.into_iter().map(HistoryEntry::from).collect()))
}

// =========================================================================
// GET /reports/monthly
// =========================================================================

async fn monthly_report(
    State(pool): State<PgPool>,
    Query(query): Query<ReportQuery>,
) -> Result<Response, AppError> {
    if !(1..=12).contains(&query.month) {
        return Err(AppError::InvalidRequest(format!(
            "month must be between 1 and 12 (got {})",
            query.month
        )));
    }
    let csv = match query.format.as_deref() {
        None | Some("json") => false,
        Some("csv") => true,
        Some(other) => {
            return Err(AppError::InvalidRequest(format!(
                "unknown report format {other:?} (expected \"json\" or \"csv\")"
            )))
        }
    };

    let rows: Vec<ReportRow> = ReportingService::new(pool)
        .monthly_report(query.year, query.month)
        .await?;

    if csv {
        let body = render_csv(&rows);
        return Ok(([(header::CONTENT_TYPE, "text/csv; charset=utf-8")], body).into_response());
    }

    Ok(Json(rows).into_response())
}

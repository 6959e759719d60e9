//! API Integration Tests
//!
//! Require a PostgreSQL database in DATABASE_URL.
//! Run with: cargo test --features integration_tests

#![cfg(feature = "integration_tests")]

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::Datelike;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::util::ServiceExt;

use escrow_ledger::api;

mod common;

async fn call(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, bytes.to_vec())
}

async fn post(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let (status, bytes) = call(app, request).await;
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    call(app, request).await
}

async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
    let (status, bytes) = get(app, uri).await;
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[tokio::test]
async fn test_escrow_flow_e2e() {
    let db = common::setup_test_db().await;
    let app = api::build_router(db.pool.clone());

    // 1. Deposit
    let (status, _) = post(&app, "/deposit", json!({"account_id": 2, "amount": "1000.00"})).await;
    assert_eq!(status, StatusCode::CREATED, "Deposit failed");

    // 2. Reserve
    let (status, body) = post(
        &app,
        "/reservation",
        json!({"account_id": 2, "service_id": 1, "order_id": 1, "price": 100}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "Reservation failed: {body}");
    assert_eq!(body["order_id"], 1);

    // 3. Duplicate reservation
    let (status, body) = post(
        &app,
        "/reservation",
        json!({"account_id": 2, "service_id": 1, "order_id": 1, "price": 100}),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error_code"], "duplicate_order");

    // 4. Revenue
    let (status, _) = post(
        &app,
        "/revenue",
        json!({"account_id": 2, "service_id": 1, "order_id": 1, "sum": "100"}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "Revenue failed");

    // 5. Balance
    let (status, body) = get_json(&app, "/accounts/2/balance").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["balance"], "900.00");

    // 6. History
    let (status, body) = get_json(&app, "/accounts/2/history?order=amount").await;
    assert_eq!(status, StatusCode::OK);
    let entries = body.as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["amount"], "-100.00");
    assert_eq!(entries[0]["operation"], "transfer");

    // 7. Monthly report as CSV
    let now = chrono::Utc::now();
    let (status, bytes) = get(
        &app,
        &format!("/reports/monthly?year={}&month={}&format=csv", now.year(), now.month()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        String::from_utf8(bytes).unwrap(),
        "service_id,total_revenue\n1,100.00\n"
    );
}

#[tokio::test]
async fn test_error_responses() {
    let db = common::setup_test_db().await;
    let app = api::build_router(db.pool.clone());

    let (status, body) = get_json(&app, "/accounts/5/balance").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error_code"], "account_not_found");

    let (status, body) = get_json(&app, "/accounts/5/history").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error_code"], "no_history");

    post(&app, "/deposit", json!({"account_id": 5, "amount": "10"})).await;
    let (status, body) =
        post(&app, "/withdrawal", json!({"account_id": 5, "amount": "10.01"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "insufficient_funds");

    let (status, body) = post(
        &app,
        "/unreservation",
        json!({"account_id": 5, "service_id": 1, "order_id": 1}),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error_code"], "no_active_reservation");

    let (status, body) = get_json(&app, "/reports/monthly?year=2000&month=1").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error_code"], "no_report_records");
}

#[tokio::test]
async fn test_health_and_correlation_id() {
    let db = common::setup_test_db().await;
    let app = api::build_router(db.pool.clone());

    let request = Request::builder()
        .uri("/health")
        .header("x-correlation-id", "550e8400-e29b-41d4-a716-446655440000")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["x-correlation-id"],
        "550e8400-e29b-41d4-a716-446655440000"
    );
}

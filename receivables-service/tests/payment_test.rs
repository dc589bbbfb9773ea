//! Payment line recording integration tests.

mod common;

use common::{decimal, receivable_body, TestApp};
use reqwest::StatusCode;
use serde_json::json;

#[tokio::test]
#[ignore] // Requires database - run with TEST_DATABASE_URL set
async fn split_payment_settles_receivable() {
    let app = TestApp::spawn().await;

    let created = app.create_receivable(receivable_body(1001, Some(1))).await;
    let id = created["receivable_id"].as_str().unwrap();

    let body = app
        .record_payments(
            id,
            json!([
                { "method": "cash", "amount": "700.00", "reference": "rcpt-1" },
                { "method": "upi", "amount": "800.00" }
            ]),
        )
        .await;

    assert_eq!(body["transactions"].as_array().unwrap().len(), 2);
    assert_eq!(body["receivable"]["status"], "paid");

    let breakdown: serde_json::Value = app
        .client
        .get(app.url(&format!("/receivables/{}/breakdown", id)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(
        decimal(&breakdown["total_received"]),
        "1500.00".parse().unwrap()
    );
    assert_eq!(decimal(&breakdown["balance"]), "0".parse().unwrap());

    // Largest method first
    let methods = breakdown["methods"].as_array().unwrap();
    assert_eq!(methods.len(), 2);
    assert_eq!(methods[0]["method"], "upi");
    assert_eq!(decimal(&methods[0]["total"]), "800.00".parse().unwrap());
    assert_eq!(methods[1]["method"], "cash");
    assert_eq!(methods[1]["count"], 1);

    app.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn partial_payment_leaves_balance() {
    let app = TestApp::spawn().await;

    let created = app.create_receivable(receivable_body(1001, Some(2))).await;
    let id = created["receivable_id"].as_str().unwrap();

    let body = app
        .record_payments(id, json!([{ "method": "cash", "amount": "1200.00" }]))
        .await;
    assert_eq!(body["receivable"]["status"], "partial");

    let breakdown: serde_json::Value = app
        .client
        .get(app.url(&format!("/receivables/{}/breakdown", id)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(decimal(&breakdown["balance"]), "300.00".parse().unwrap());

    app.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn payments_accumulate_across_batches() {
    let app = TestApp::spawn().await;

    let created = app.create_receivable(receivable_body(1001, Some(3))).await;
    let id = created["receivable_id"].as_str().unwrap();

    let body = app
        .record_payments(id, json!([{ "method": "cash", "amount": "700.00" }]))
        .await;
    assert_eq!(body["receivable"]["status"], "partial");

    let body = app
        .record_payments(id, json!([{ "method": "card", "amount": "800.00" }]))
        .await;
    assert_eq!(body["receivable"]["status"], "paid");

    app.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn invalid_line_rejects_whole_batch() {
    let app = TestApp::spawn().await;

    let created = app.create_receivable(receivable_body(1001, Some(4))).await;
    let id = created["receivable_id"].as_str().unwrap();

    let response = app
        .client
        .post(app.url(&format!("/receivables/{}/payments", id)))
        .json(&json!({
            "lines": [
                { "method": "cash", "amount": "500.00" },
                { "method": "card", "amount": "-50.00" }
            ]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // No line from the batch was persisted
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM transactions")
        .fetch_one(app.db.pool())
        .await
        .unwrap();
    assert_eq!(count, 0);

    let body: serde_json::Value = app
        .client
        .get(app.url(&format!("/receivables/{}", id)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "pending");

    // A zero amount is rejected the same way
    let response = app
        .client
        .post(app.url(&format!("/receivables/{}/payments", id)))
        .json(&json!({ "lines": [{ "method": "cash", "amount": "0.00" }] }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    app.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn payments_against_unknown_receivable_404() {
    let app = TestApp::spawn().await;

    let response = app
        .client
        .post(app.url(&format!(
            "/receivables/{}/payments",
            uuid::Uuid::new_v4()
        )))
        .json(&json!({ "lines": [{ "method": "cash", "amount": "100.00" }] }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    app.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn empty_line_list_is_rejected() {
    let app = TestApp::spawn().await;

    let created = app.create_receivable(receivable_body(1001, Some(5))).await;
    let id = created["receivable_id"].as_str().unwrap();

    let response = app
        .client
        .post(app.url(&format!("/receivables/{}/payments", id)))
        .json(&json!({ "lines": [] }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    app.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn empty_slice_is_a_ledger_noop() {
    let app = TestApp::spawn().await;

    // Ledger-level contract: an empty batch succeeds without touching the db
    let result = app
        .db
        .create_transactions(uuid::Uuid::new_v4(), &[], None)
        .await
        .expect("empty batch should succeed");
    assert!(result.is_empty());

    app.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn lines_are_normalized_and_listed_oldest_first() {
    let app = TestApp::spawn().await;

    let created = app.create_receivable(receivable_body(1001, Some(6))).await;
    let id = created["receivable_id"].as_str().unwrap();

    let first = app
        .client
        .post(app.url(&format!("/receivables/{}/payments", id)))
        .json(&json!({
            "lines": [{ "method": " CASH ", "amount": "100.00", "reference": "   " }],
            "recorded_by": 9001
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::CREATED);
    let first: serde_json::Value = first.json().await.unwrap();
    assert_eq!(first["transactions"][0]["method"], "cash");
    assert_eq!(first["transactions"][0]["reference"], serde_json::Value::Null);
    assert_eq!(first["transactions"][0]["created_by"], 9001);

    app.record_payments(id, json!([{ "method": "upi", "amount": "50.00" }]))
        .await;

    let listed: serde_json::Value = app
        .client
        .get(app.url(&format!("/receivables/{}/transactions", id)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let rows = listed.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["method"], "cash");
    assert_eq!(rows[1]["method"], "upi");

    let missing = app
        .client
        .get(app.url(&format!(
            "/receivables/{}/transactions",
            uuid::Uuid::new_v4()
        )))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    app.cleanup().await;
}

//! Collection report integration tests.

mod common;

use chrono::{Datelike, Utc};
use common::{decimal, receivable_body, TestApp};
use reqwest::StatusCode;
use serde_json::json;

#[tokio::test]
#[ignore] // Requires database - run with TEST_DATABASE_URL set
async fn daily_report_joins_receivable_details() {
    let app = TestApp::spawn().await;

    let created = app.create_receivable(receivable_body(3001, Some(1))).await;
    let id = created["receivable_id"].as_str().unwrap();
    app.record_payments(
        id,
        json!([
            { "method": "cash", "amount": "250.00" },
            { "method": "upi", "amount": "100.00" }
        ]),
    )
    .await;

    let today = Utc::now().date_naive();
    let body: serde_json::Value = app
        .client
        .get(app.url(&format!("/reports/daily?date={}", today)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 2);

    let methods: Vec<&str> = rows
        .iter()
        .map(|r| r["method"].as_str().unwrap())
        .collect();
    assert!(methods.contains(&"cash"));
    assert!(methods.contains(&"upi"));
    for row in rows {
        assert_eq!(row["receivable_type"], "invoice");
        assert_eq!(row["user_id"], 3001);
        assert_eq!(decimal(&row["final_amount"]), "1500.00".parse().unwrap());
    }

    // A day with no collections is an empty report
    let body: serde_json::Value = app
        .client
        .get(app.url("/reports/daily?date=2020-01-01"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(body.as_array().unwrap().is_empty());

    app.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn weekly_report_groups_by_day_and_method() {
    let app = TestApp::spawn().await;

    let created = app.create_receivable(receivable_body(3001, Some(2))).await;
    let id = created["receivable_id"].as_str().unwrap();
    app.record_payments(id, json!([{ "method": "cash", "amount": "100.00" }]))
        .await;
    app.record_payments(id, json!([{ "method": "cash", "amount": "200.00" }]))
        .await;
    app.record_payments(id, json!([{ "method": "upi", "amount": "50.00" }]))
        .await;

    let body: serde_json::Value = app
        .client
        .get(app.url("/reports/weekly?days=7"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 2);

    let today = Utc::now().date_naive().to_string();
    assert_eq!(rows[0]["day"], today);
    assert_eq!(rows[0]["method"], "cash");
    assert_eq!(decimal(&rows[0]["total"]), "300.00".parse().unwrap());
    assert_eq!(rows[0]["count"], 2);
    assert_eq!(rows[1]["method"], "upi");
    assert_eq!(rows[1]["count"], 1);

    // Window validation
    let response = app
        .client
        .get(app.url("/reports/weekly?days=0"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    app.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn monthly_report_covers_calendar_month() {
    let app = TestApp::spawn().await;

    let created = app.create_receivable(receivable_body(3001, Some(3))).await;
    let id = created["receivable_id"].as_str().unwrap();
    app.record_payments(id, json!([{ "method": "card", "amount": "400.00" }]))
        .await;

    let today = Utc::now().date_naive();
    let body: serde_json::Value = app
        .client
        .get(app.url(&format!(
            "/reports/monthly?year={}&month={}",
            today.year(),
            today.month()
        )))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["method"], "card");
    assert_eq!(decimal(&rows[0]["total"]), "400.00".parse().unwrap());

    let response = app
        .client
        .get(app.url("/reports/monthly?year=2026&month=13"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    app.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn method_breakdown_orders_by_total() {
    let app = TestApp::spawn().await;

    let created = app.create_receivable(receivable_body(3001, Some(4))).await;
    let id = created["receivable_id"].as_str().unwrap();
    app.record_payments(id, json!([{ "method": "cash", "amount": "300.00" }]))
        .await;
    app.record_payments(id, json!([{ "method": "upi", "amount": "50.00" }]))
        .await;

    let today = Utc::now().date_naive();
    let body: serde_json::Value = app
        .client
        .get(app.url(&format!(
            "/reports/methods?start_date={}&end_date={}",
            today, today
        )))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["method"], "cash");
    assert_eq!(decimal(&rows[0]["total"]), "300.00".parse().unwrap());
    assert_eq!(rows[1]["method"], "upi");

    // Inverted range is rejected
    let response = app
        .client
        .get(app.url(&format!(
            "/reports/methods?start_date={}&end_date=2020-01-01",
            today
        )))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    app.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn outstanding_excludes_settled_receivables() {
    let app = TestApp::spawn().await;

    let untouched = app.create_receivable(receivable_body(3001, Some(5))).await;

    let part_paid = app.create_receivable(receivable_body(3002, Some(6))).await;
    app.record_payments(
        part_paid["receivable_id"].as_str().unwrap(),
        json!([{ "method": "cash", "amount": "500.00" }]),
    )
    .await;

    let mut settled_body = receivable_body(3003, Some(7));
    settled_body["bill_amount"] = json!("1000.00");
    settled_body["final_amount"] = json!("1000.00");
    let settled = app.create_receivable(settled_body).await;
    app.record_payments(
        settled["receivable_id"].as_str().unwrap(),
        json!([{ "method": "upi", "amount": "1000.00" }]),
    )
    .await;

    let body: serde_json::Value = app
        .client
        .get(app.url("/reports/outstanding"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 2);

    // Largest balance first
    assert_eq!(rows[0]["receivable_id"], untouched["receivable_id"]);
    assert_eq!(rows[0]["status"], "pending");
    assert_eq!(decimal(&rows[0]["balance"]), "1500.00".parse().unwrap());
    assert_eq!(decimal(&rows[0]["received"]), "0".parse().unwrap());

    assert_eq!(rows[1]["receivable_id"], part_paid["receivable_id"]);
    assert_eq!(rows[1]["status"], "partial");
    assert_eq!(decimal(&rows[1]["balance"]), "1000.00".parse().unwrap());
    assert_eq!(decimal(&rows[1]["received"]), "500.00".parse().unwrap());

    app.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn aging_buckets_by_days_overdue() {
    let app = TestApp::spawn().await;

    let mut oldest = receivable_body(4001, Some(1));
    oldest["due_date"] = json!("2025-08-01");
    let oldest = app.create_receivable(oldest).await;

    let mut midway = receivable_body(4001, Some(2));
    midway["due_date"] = json!("2026-01-29"); // 45 days before as_of
    let midway = app.create_receivable(midway).await;

    let mut recent = receivable_body(4001, Some(3));
    recent["due_date"] = json!("2026-03-10");
    let recent = app.create_receivable(recent).await;

    let mut undated = receivable_body(4001, Some(4));
    undated["due_date"] = json!(null);
    let undated = app.create_receivable(undated).await;

    let mut settled = receivable_body(4001, Some(5));
    settled["due_date"] = json!("2026-01-01");
    let settled = app.create_receivable(settled).await;
    app.record_payments(
        settled["receivable_id"].as_str().unwrap(),
        json!([{ "method": "cash", "amount": "1500.00" }]),
    )
    .await;

    let body: serde_json::Value = app
        .client
        .get(app.url("/reports/aging?as_of=2026-03-15"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 4);

    // Ordered by due date, undated last; settled receivables never appear
    assert_eq!(rows[0]["receivable_id"], oldest["receivable_id"]);
    assert_eq!(rows[0]["bucket"], "d90_plus");

    assert_eq!(rows[1]["receivable_id"], midway["receivable_id"]);
    assert_eq!(rows[1]["bucket"], "d30");
    assert_eq!(rows[1]["days_overdue"], 45);

    assert_eq!(rows[2]["receivable_id"], recent["receivable_id"]);
    assert_eq!(rows[2]["bucket"], "current");
    assert_eq!(rows[2]["days_overdue"], 5);

    assert_eq!(rows[3]["receivable_id"], undated["receivable_id"]);
    assert_eq!(rows[3]["bucket"], "no_due");
    assert_eq!(rows[3]["days_overdue"], serde_json::Value::Null);

    app.cleanup().await;
}

//! Request and response types for the receivables API.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::{Receivable, Transaction};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateReceivableRequest {
    #[validate(range(min = 1, message = "user_id must be positive"))]
    pub user_id: i64,
    #[validate(length(min = 1, max = 50, message = "receivable_type must be 1-50 characters"))]
    pub receivable_type: String,
    pub source_id: Option<i64>,
    pub bill_amount: Decimal,
    #[serde(default)]
    pub discount_amount: Decimal,
    pub final_amount: Decimal,
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct PaymentLineRequest {
    pub method: String,
    pub amount: Decimal,
    pub reference: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RecordPaymentsRequest {
    #[validate(length(min = 1, message = "At least one payment line is required"))]
    pub lines: Vec<PaymentLineRequest>,
    pub recorded_by: Option<i64>,
}

/// Lines as persisted plus the receivable after reconciliation.
#[derive(Debug, Serialize)]
pub struct RecordPaymentsResponse {
    pub transactions: Vec<Transaction>,
    pub receivable: Receivable,
}

#[derive(Debug, Deserialize)]
pub struct DateParam {
    pub date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct WeeklyParams {
    /// Last day of the window; defaults to today.
    pub end_date: Option<NaiveDate>,
    #[serde(default = "default_window_days")]
    pub days: i32,
}

fn default_window_days() -> i32 {
    7
}

#[derive(Debug, Deserialize)]
pub struct MonthlyParams {
    pub year: i32,
    pub month: u32,
}

#[derive(Debug, Deserialize)]
pub struct RangeParams {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct AsOfParams {
    /// Reference day for balances and buckets; defaults to today.
    pub as_of: Option<NaiveDate>,
}

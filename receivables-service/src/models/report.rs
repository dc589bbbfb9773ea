//! Report row models for the read-only reporting queries.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One payment line in a daily collections report, joined with its
/// receivable for display context.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DailyCollectionRow {
    pub transaction_id: Uuid,
    pub receivable_id: Uuid,
    pub method: String,
    pub amount: Decimal,
    pub reference: Option<String>,
    pub created_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub receivable_type: String,
    pub source_id: Option<i64>,
    pub final_amount: Decimal,
    pub user_id: i64,
}

/// Collections grouped by day and payment method.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CollectionsByDay {
    pub day: NaiveDate,
    pub method: String,
    pub total: Decimal,
    pub count: i64,
}

/// An unsettled or overdue receivable with its computed balance.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OutstandingRow {
    pub receivable_id: Uuid,
    pub user_id: i64,
    pub receivable_type: String,
    pub source_id: Option<i64>,
    pub final_amount: Decimal,
    pub status: String,
    pub due_date: Option<NaiveDate>,
    pub received: Decimal,
    pub balance: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Aging bucket for an unpaid receivable, keyed by days past due.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgingBucket {
    Current,
    D30,
    D60,
    D90,
    D90Plus,
    NoDue,
}

impl AgingBucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgingBucket::Current => "current",
            AgingBucket::D30 => "d30",
            AgingBucket::D60 => "d60",
            AgingBucket::D90 => "d90",
            AgingBucket::D90Plus => "d90_plus",
            AgingBucket::NoDue => "no_due",
        }
    }

    /// Assign the bucket for a due date as of a reference day.
    ///
    /// Buckets are half-open 30-day windows on days past due: `current`
    /// covers everything under 30 (including not yet due), `d30` covers
    /// [30, 60), `d60` [60, 90), `d90` [90, 120), `d90_plus` 120 and up.
    /// Receivables without a due date land in `no_due`.
    pub fn from_due_date(due_date: Option<NaiveDate>, as_of: NaiveDate) -> Self {
        let due = match due_date {
            Some(d) => d,
            None => return AgingBucket::NoDue,
        };

        let days_overdue = (as_of - due).num_days();
        if days_overdue < 30 {
            AgingBucket::Current
        } else if days_overdue < 60 {
            AgingBucket::D30
        } else if days_overdue < 90 {
            AgingBucket::D60
        } else if days_overdue < 120 {
            AgingBucket::D90
        } else {
            AgingBucket::D90Plus
        }
    }
}

/// An unpaid receivable annotated with its aging bucket.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AgingRow {
    pub receivable_id: Uuid,
    pub user_id: i64,
    pub receivable_type: String,
    pub source_id: Option<i64>,
    pub final_amount: Decimal,
    pub received: Decimal,
    pub balance: Decimal,
    pub status: String,
    pub due_date: Option<NaiveDate>,
    #[sqlx(default)]
    pub days_overdue: Option<i64>,
    #[sqlx(default)]
    pub bucket: String,
}

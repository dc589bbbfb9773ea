//! Receivable model and status derivation.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Received totals within this amount of the final amount count as settled.
/// Absorbs rounding left over from caller-side GST and discount arithmetic.
pub const SETTLEMENT_EPSILON: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Receivable status.
///
/// `pending`, `partial` and `paid` are derived from the ledger;
/// `cancelled` is terminal and only ever set by an explicit cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceivableStatus {
    Pending,
    Partial,
    Paid,
    Cancelled,
}

impl ReceivableStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReceivableStatus::Pending => "pending",
            ReceivableStatus::Partial => "partial",
            ReceivableStatus::Paid => "paid",
            ReceivableStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "partial" => ReceivableStatus::Partial,
            "paid" => ReceivableStatus::Paid,
            "cancelled" => ReceivableStatus::Cancelled,
            _ => ReceivableStatus::Pending,
        }
    }

    /// Whether the status admits no further derived transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReceivableStatus::Cancelled)
    }

    /// Derive the status from amounts alone.
    ///
    /// Deterministic and order-independent: only the sum of recorded
    /// payment lines matters, never the sequence they arrived in.
    /// Never yields `Cancelled`.
    pub fn from_amounts(final_amount: Decimal, total_received: Decimal) -> Self {
        if total_received <= Decimal::ZERO {
            ReceivableStatus::Pending
        } else if total_received >= final_amount - SETTLEMENT_EPSILON {
            ReceivableStatus::Paid
        } else {
            ReceivableStatus::Partial
        }
    }
}

/// A billable event awaiting settlement.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Receivable {
    pub receivable_id: Uuid,
    pub user_id: i64,
    pub receivable_type: String,
    pub source_id: Option<i64>,
    pub bill_amount: Decimal,
    pub discount_amount: Decimal,
    pub final_amount: Decimal,
    pub status: String,
    pub due_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Receivable {
    pub fn parsed_status(&self) -> ReceivableStatus {
        ReceivableStatus::from_string(&self.status)
    }
}

/// Input for creating a receivable.
#[derive(Debug, Clone)]
pub struct CreateReceivable {
    pub user_id: i64,
    pub receivable_type: String,
    pub source_id: Option<i64>,
    pub bill_amount: Decimal,
    pub discount_amount: Decimal,
    pub final_amount: Decimal,
    pub due_date: Option<NaiveDate>,
}

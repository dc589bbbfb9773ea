//! Payment line and ledger transaction models.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::Receivable;

/// A validated payment line awaiting insertion.
///
/// Construction is the validation boundary: a `PaymentLine` always carries a
/// normalized non-empty method and a positive amount, so a batch containing
/// any bad line fails before a single row is written.
#[derive(Debug, Clone)]
pub struct PaymentLine {
    method: String,
    amount: Decimal,
    reference: Option<String>,
}

impl PaymentLine {
    pub fn new(method: &str, amount: Decimal, reference: Option<String>) -> Result<Self, AppError> {
        let method = method.trim().to_lowercase();
        if method.is_empty() {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Payment method must not be empty"
            )));
        }
        if method.len() > 20 {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Payment method must be at most 20 characters"
            )));
        }
        if amount <= Decimal::ZERO {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Payment amount must be positive, got {}",
                amount
            )));
        }
        let reference = reference
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());

        Ok(Self {
            method,
            amount,
            reference,
        })
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn reference(&self) -> Option<&str> {
        self.reference.as_deref()
    }
}

/// A recorded payment line. Append-only: never updated after insertion.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Transaction {
    pub transaction_id: Uuid,
    pub receivable_id: Uuid,
    pub method: String,
    pub amount: Decimal,
    pub reference: Option<String>,
    pub created_by: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Per-method received total for one receivable or a reporting window.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MethodTotal {
    pub method: String,
    pub total: Decimal,
    pub count: i64,
}

/// A receivable together with its settlement state.
#[derive(Debug, Clone, Serialize)]
pub struct ReceivableBreakdown {
    pub receivable: Receivable,
    pub total_received: Decimal,
    pub balance: Decimal,
    pub methods: Vec<MethodTotal>,
}

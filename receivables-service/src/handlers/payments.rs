//! Payment recording and status reconciliation handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::dtos::{RecordPaymentsRequest, RecordPaymentsResponse};
use crate::models::{PaymentLine, Receivable, Transaction};
use crate::startup::AppState;

/// Record a batch of payment lines, then reconcile the receivable's status.
///
/// Every line is validated before anything is written, so one bad line
/// rejects the whole batch. The response carries the persisted lines and the
/// receivable as it stands after reconciliation.
pub async fn record_payments(
    State(state): State<AppState>,
    Path(receivable_id): Path<Uuid>,
    Json(payload): Json<RecordPaymentsRequest>,
) -> Result<(StatusCode, Json<RecordPaymentsResponse>), AppError> {
    payload.validate()?;

    let lines = payload
        .lines
        .iter()
        .map(|line| PaymentLine::new(&line.method, line.amount, line.reference.clone()))
        .collect::<Result<Vec<_>, _>>()?;

    let transactions = state
        .db
        .create_transactions(receivable_id, &lines, payload.recorded_by)
        .await?;

    let receivable = state.db.update_receivable_status(receivable_id).await?;

    Ok((
        StatusCode::CREATED,
        Json(RecordPaymentsResponse {
            transactions,
            receivable,
        }),
    ))
}

/// Recompute a receivable's status from its recorded payment lines.
pub async fn reconcile_receivable(
    State(state): State<AppState>,
    Path(receivable_id): Path<Uuid>,
) -> Result<Json<Receivable>, AppError> {
    Ok(Json(state.db.update_receivable_status(receivable_id).await?))
}

/// List the payment lines recorded against a receivable, oldest first.
pub async fn list_transactions(
    State(state): State<AppState>,
    Path(receivable_id): Path<Uuid>,
) -> Result<Json<Vec<Transaction>>, AppError> {
    // An unknown receivable is a 404, not an empty list.
    state
        .db
        .get_receivable(receivable_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Receivable not found")))?;

    Ok(Json(state.db.get_transactions(receivable_id).await?))
}

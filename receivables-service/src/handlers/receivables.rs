//! Receivable lifecycle handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::json;
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::dtos::CreateReceivableRequest;
use crate::models::{CreateReceivable, Receivable, ReceivableBreakdown};
use crate::startup::AppState;

/// Create a receivable, or return the existing one for the same source.
///
/// Returns 201 when a row was inserted, 200 when the request resolved to an
/// already-existing receivable.
pub async fn create_receivable(
    State(state): State<AppState>,
    Json(payload): Json<CreateReceivableRequest>,
) -> Result<(StatusCode, Json<Receivable>), AppError> {
    payload.validate()?;

    let input = CreateReceivable {
        user_id: payload.user_id,
        receivable_type: payload.receivable_type,
        source_id: payload.source_id,
        bill_amount: payload.bill_amount,
        discount_amount: payload.discount_amount,
        final_amount: payload.final_amount,
        due_date: payload.due_date,
    };

    let (receivable, created) = state.db.create_receivable(&input).await?;
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };

    Ok((status, Json(receivable)))
}

/// Get a receivable by ID.
pub async fn get_receivable(
    State(state): State<AppState>,
    Path(receivable_id): Path<Uuid>,
) -> Result<Json<Receivable>, AppError> {
    let receivable = state
        .db
        .get_receivable(receivable_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Receivable not found")))?;

    Ok(Json(receivable))
}

/// Get the receivable created for a specific business record.
pub async fn get_receivable_by_source(
    State(state): State<AppState>,
    Path((receivable_type, source_id)): Path<(String, i64)>,
) -> Result<Json<Receivable>, AppError> {
    let receivable = state
        .db
        .get_receivable_by_source(&receivable_type, source_id)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(anyhow::anyhow!(
                "No receivable for {} source {}",
                receivable_type,
                source_id
            ))
        })?;

    Ok(Json(receivable))
}

/// List unpaid receivables whose due date has passed.
pub async fn get_overdue_receivables(
    State(state): State<AppState>,
) -> Result<Json<Vec<Receivable>>, AppError> {
    Ok(Json(state.db.get_overdue_receivables().await?))
}

/// A receivable with its received total, balance and per-method split.
pub async fn get_receivable_breakdown(
    State(state): State<AppState>,
    Path(receivable_id): Path<Uuid>,
) -> Result<Json<ReceivableBreakdown>, AppError> {
    let breakdown = state
        .db
        .get_receivable_breakdown(receivable_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Receivable not found")))?;

    Ok(Json(breakdown))
}

/// Cancel a pending or partially paid receivable.
pub async fn cancel_receivable(
    State(state): State<AppState>,
    Path(receivable_id): Path<Uuid>,
) -> Result<Json<Receivable>, AppError> {
    Ok(Json(state.db.cancel_receivable(receivable_id).await?))
}

/// List a member's receivables, newest first.
pub async fn list_user_receivables(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<Vec<Receivable>>, AppError> {
    Ok(Json(state.db.list_receivables_for_user(user_id).await?))
}

/// Delete all of a member's receivables and their payment lines.
pub async fn delete_user_receivables(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<serde_json::Value>, AppError> {
    let deleted = state.db.delete_receivables_for_user(user_id).await?;
    Ok(Json(json!({ "deleted": deleted })))
}

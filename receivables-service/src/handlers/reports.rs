//! Collection report handlers.

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::Utc;
use service_core::error::AppError;

use crate::dtos::{AsOfParams, DateParam, MonthlyParams, RangeParams, WeeklyParams};
use crate::models::{AgingRow, CollectionsByDay, DailyCollectionRow, MethodTotal, OutstandingRow};
use crate::startup::AppState;

/// Payment lines collected on one day.
pub async fn daily_collections(
    State(state): State<AppState>,
    Query(params): Query<DateParam>,
) -> Result<Json<Vec<DailyCollectionRow>>, AppError> {
    Ok(Json(state.db.generate_daily_collections(params.date).await?))
}

/// Collections per day and method over a trailing window.
pub async fn weekly_collections(
    State(state): State<AppState>,
    Query(params): Query<WeeklyParams>,
) -> Result<Json<Vec<CollectionsByDay>>, AppError> {
    let end_date = params.end_date.unwrap_or_else(|| Utc::now().date_naive());
    Ok(Json(
        state
            .db
            .generate_weekly_summary(end_date, params.days)
            .await?,
    ))
}

/// Collections per day and method for one calendar month.
pub async fn monthly_collections(
    State(state): State<AppState>,
    Query(params): Query<MonthlyParams>,
) -> Result<Json<Vec<CollectionsByDay>>, AppError> {
    Ok(Json(
        state
            .db
            .generate_monthly_collections(params.year, params.month)
            .await?,
    ))
}

/// Totals per payment method over an inclusive date range.
pub async fn method_breakdown(
    State(state): State<AppState>,
    Query(params): Query<RangeParams>,
) -> Result<Json<Vec<MethodTotal>>, AppError> {
    Ok(Json(
        state
            .db
            .generate_payment_method_breakdown(params.start_date, params.end_date)
            .await?,
    ))
}

/// Receivables that still carry money owed.
pub async fn outstanding(
    State(state): State<AppState>,
    Query(params): Query<AsOfParams>,
) -> Result<Json<Vec<OutstandingRow>>, AppError> {
    let as_of = params.as_of.unwrap_or_else(|| Utc::now().date_naive());
    Ok(Json(state.db.generate_outstanding(as_of).await?))
}

/// Unpaid receivables bucketed by how far past due they are.
pub async fn aging(
    State(state): State<AppState>,
    Query(params): Query<AsOfParams>,
) -> Result<Json<Vec<AgingRow>>, AppError> {
    let as_of = params.as_of.unwrap_or_else(|| Utc::now().date_naive());
    Ok(Json(state.db.generate_aging(as_of).await?))
}

//! Read-only collection reports.
//!
//! Every query here aggregates the receivables and transactions tables as
//! they are; nothing is written and no locks are taken, so reports can run
//! alongside concurrent payment recording.

use crate::models::{
    AgingBucket, AgingRow, CollectionsByDay, DailyCollectionRow, MethodTotal, OutstandingRow,
};
use crate::services::database::Database;
use crate::services::metrics::DB_QUERY_DURATION;
use chrono::NaiveDate;
use service_core::error::AppError;
use tracing::instrument;

impl Database {
    /// Payment lines collected on a single day, newest first, with the
    /// owning receivable's details joined in.
    #[instrument(skip(self), fields(date = %date))]
    pub async fn generate_daily_collections(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<DailyCollectionRow>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["generate_daily_collections"])
            .start_timer();

        let rows = sqlx::query_as::<_, DailyCollectionRow>(
            r#"
            SELECT t.transaction_id, t.receivable_id, t.method, t.amount, t.reference, t.created_by, t.created_at,
                   r.receivable_type, r.source_id, r.final_amount, r.user_id
            FROM transactions t
            JOIN receivables r ON r.receivable_id = t.receivable_id
            WHERE t.created_at::date = $1
            ORDER BY t.created_at DESC
            "#,
        )
        .bind(date)
        .fetch_all(self.pool())
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to generate daily report: {}", e))
        })?;

        timer.observe_duration();

        Ok(rows)
    }

    /// Collections per day and method over the window ending at `end_date`.
    ///
    /// The window covers `days` calendar days up to and including `end_date`.
    #[instrument(skip(self), fields(end_date = %end_date, days = days))]
    pub async fn generate_weekly_summary(
        &self,
        end_date: NaiveDate,
        days: i32,
    ) -> Result<Vec<CollectionsByDay>, AppError> {
        if days <= 0 {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Window must cover at least one day, got {}",
                days
            )));
        }

        let timer = DB_QUERY_DURATION
            .with_label_values(&["generate_weekly_summary"])
            .start_timer();

        let rows = sqlx::query_as::<_, CollectionsByDay>(
            r#"
            SELECT t.created_at::date AS day, t.method, SUM(t.amount) AS total, COUNT(*) AS count
            FROM transactions t
            WHERE t.created_at::date > $1 - $2::int AND t.created_at::date <= $1
            GROUP BY day, t.method
            ORDER BY day DESC, total DESC
            "#,
        )
        .bind(end_date)
        .bind(days)
        .fetch_all(self.pool())
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to generate weekly report: {}", e))
        })?;

        timer.observe_duration();

        Ok(rows)
    }

    /// Collections per day and method for one calendar month.
    #[instrument(skip(self), fields(year = year, month = month))]
    pub async fn generate_monthly_collections(
        &self,
        year: i32,
        month: u32,
    ) -> Result<Vec<CollectionsByDay>, AppError> {
        let (start, end) = month_window(year, month)?;

        let timer = DB_QUERY_DURATION
            .with_label_values(&["generate_monthly_collections"])
            .start_timer();

        let rows = sqlx::query_as::<_, CollectionsByDay>(
            r#"
            SELECT t.created_at::date AS day, t.method, SUM(t.amount) AS total, COUNT(*) AS count
            FROM transactions t
            WHERE t.created_at::date >= $1 AND t.created_at::date < $2
            GROUP BY day, t.method
            ORDER BY day ASC, total DESC
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_all(self.pool())
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to generate monthly report: {}", e))
        })?;

        timer.observe_duration();

        Ok(rows)
    }

    /// Totals per payment method over an inclusive date range.
    #[instrument(skip(self), fields(start_date = %start_date, end_date = %end_date))]
    pub async fn generate_payment_method_breakdown(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<MethodTotal>, AppError> {
        if start_date > end_date {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "start_date {} is after end_date {}",
                start_date,
                end_date
            )));
        }

        let timer = DB_QUERY_DURATION
            .with_label_values(&["generate_payment_method_breakdown"])
            .start_timer();

        let rows = sqlx::query_as::<_, MethodTotal>(
            r#"
            SELECT t.method, SUM(t.amount) AS total, COUNT(*) AS count
            FROM transactions t
            WHERE t.created_at::date >= $1 AND t.created_at::date <= $2
            GROUP BY t.method
            ORDER BY total DESC
            "#,
        )
        .bind(start_date)
        .bind(end_date)
        .fetch_all(self.pool())
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!(
                "Failed to generate method breakdown: {}",
                e
            ))
        })?;

        timer.observe_duration();

        Ok(rows)
    }

    /// Receivables that still carry money owed, largest balance first.
    ///
    /// Includes open receivables (pending or partial) and anything past due
    /// that is not settled. Settled receivables never appear.
    #[instrument(skip(self), fields(as_of = %as_of))]
    pub async fn generate_outstanding(
        &self,
        as_of: NaiveDate,
    ) -> Result<Vec<OutstandingRow>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["generate_outstanding"])
            .start_timer();

        let rows = sqlx::query_as::<_, OutstandingRow>(
            r#"
            SELECT r.receivable_id, r.user_id, r.receivable_type, r.source_id, r.final_amount, r.status, r.due_date,
                   COALESCE(p.received, 0) AS received,
                   r.final_amount - COALESCE(p.received, 0) AS balance,
                   r.created_at
            FROM receivables r
            LEFT JOIN (
                SELECT receivable_id, SUM(amount) AS received
                FROM transactions
                GROUP BY receivable_id
            ) p ON p.receivable_id = r.receivable_id
            WHERE r.status IN ('pending', 'partial')
               OR (r.due_date IS NOT NULL AND r.due_date < $1 AND r.status <> 'paid')
            ORDER BY balance DESC
            "#,
        )
        .bind(as_of)
        .fetch_all(self.pool())
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!(
                "Failed to generate outstanding report: {}",
                e
            ))
        })?;

        timer.observe_duration();

        Ok(rows)
    }

    /// Unpaid receivables bucketed by how far past due they are.
    ///
    /// Bucket assignment happens in [`AgingBucket::from_due_date`] so the
    /// thresholds live in one place and are unit-testable.
    #[instrument(skip(self), fields(as_of = %as_of))]
    pub async fn generate_aging(&self, as_of: NaiveDate) -> Result<Vec<AgingRow>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["generate_aging"])
            .start_timer();

        let mut rows = sqlx::query_as::<_, AgingRow>(
            r#"
            SELECT r.receivable_id, r.user_id, r.receivable_type, r.source_id, r.final_amount,
                   COALESCE(p.received, 0) AS received,
                   r.final_amount - COALESCE(p.received, 0) AS balance,
                   r.status, r.due_date
            FROM receivables r
            LEFT JOIN (
                SELECT receivable_id, SUM(amount) AS received
                FROM transactions
                GROUP BY receivable_id
            ) p ON p.receivable_id = r.receivable_id
            WHERE r.status <> 'paid'
            ORDER BY r.due_date ASC NULLS LAST
            "#,
        )
        .fetch_all(self.pool())
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to generate aging report: {}", e))
        })?;

        timer.observe_duration();

        for row in &mut rows {
            row.days_overdue = row.due_date.map(|due| (as_of - due).num_days());
            row.bucket = AgingBucket::from_due_date(row.due_date, as_of)
                .as_str()
                .to_string();
        }

        Ok(rows)
    }
}

/// First day of the month and first day of the next, as a half-open window.
fn month_window(year: i32, month: u32) -> Result<(NaiveDate, NaiveDate), AppError> {
    let start = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Invalid month {}-{}", year, month)))?;

    let end = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Invalid month {}-{}", year, month)))?;

    Ok((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn month_window_covers_the_month() {
        let (start, end) = month_window(2026, 2).unwrap();
        assert_eq!(start, NaiveDate::from_ymd_opt(2026, 2, 1).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2026, 3, 1).unwrap());
    }

    #[test]
    fn month_window_rolls_over_december() {
        let (start, end) = month_window(2025, 12).unwrap();
        assert_eq!(start, NaiveDate::from_ymd_opt(2025, 12, 1).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2026, 1, 1).unwrap());
    }

    #[test]
    fn month_window_rejects_bad_month() {
        assert!(month_window(2026, 0).is_err());
        assert!(month_window(2026, 13).is_err());
    }
}

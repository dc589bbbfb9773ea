//! Database service for receivables-service.

use crate::models::{
    CreateReceivable, MethodTotal, PaymentLine, Receivable, ReceivableBreakdown, ReceivableStatus,
    Transaction,
};
use crate::services::metrics::{
    record_error, record_receivable_created, record_status_transition, record_transaction_recorded,
    DB_QUERY_DURATION,
};
use rust_decimal::Decimal;
use service_core::error::AppError;
use service_core::retry::{retry_db_call, RetryConfig};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
    retry: RetryConfig,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url, retry))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
        retry: RetryConfig,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool, retry })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Receivable Operations
    // -------------------------------------------------------------------------

    /// Create a receivable, or return the existing one for the same
    /// (receivable_type, source_id) pair.
    ///
    /// The boolean is true when a new row was inserted. Creation races are
    /// settled by the partial unique index: the loser re-reads the surviving
    /// row, so callers never observe a conflict.
    #[instrument(
        skip(self, input),
        fields(user_id = %input.user_id, receivable_type = %input.receivable_type)
    )]
    pub async fn create_receivable(
        &self,
        input: &CreateReceivable,
    ) -> Result<(Receivable, bool), AppError> {
        let receivable_type = validate_receivable(input)?;

        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_receivable"])
            .start_timer();

        // Fast path: the originating record may already have a receivable.
        if let Some(source_id) = input.source_id {
            let existing = self
                .fetch_by_source(&receivable_type, source_id)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(anyhow::anyhow!("Failed to look up receivable: {}", e))
                })?;
            if let Some(existing) = existing {
                timer.observe_duration();
                info!(
                    receivable_id = %existing.receivable_id,
                    source_id = source_id,
                    "Receivable already exists for source, returning existing row"
                );
                return Ok((existing, false));
            }
        }

        let receivable_id = Uuid::new_v4();
        let result = retry_db_call(&self.retry, "create_receivable", || {
            self.insert_receivable(receivable_id, input, &receivable_type)
        })
        .await;

        let receivable = match result {
            Ok(receivable) => receivable,
            Err(sqlx::Error::Database(ref db_err)) if db_err.is_unique_violation() => {
                // Lost a creation race; the surviving row is the answer.
                timer.observe_duration();
                let existing = self
                    .resolve_create_conflict(&receivable_type, input.source_id)
                    .await?;
                return Ok((existing, false));
            }
            Err(e) => {
                record_error("create_receivable");
                return Err(AppError::DatabaseError(anyhow::anyhow!(
                    "Failed to create receivable: {}",
                    e
                )));
            }
        };

        timer.observe_duration();
        record_receivable_created(&receivable.receivable_type);

        info!(
            receivable_id = %receivable.receivable_id,
            final_amount = %receivable.final_amount,
            due_date = ?receivable.due_date,
            "Receivable created"
        );

        Ok((receivable, true))
    }

    async fn insert_receivable(
        &self,
        receivable_id: Uuid,
        input: &CreateReceivable,
        receivable_type: &str,
    ) -> Result<Receivable, sqlx::Error> {
        sqlx::query_as::<_, Receivable>(
            r#"
            INSERT INTO receivables (receivable_id, user_id, receivable_type, source_id, bill_amount, discount_amount, final_amount, status, due_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING receivable_id, user_id, receivable_type, source_id, bill_amount, discount_amount, final_amount, status, due_date, created_at, updated_at
            "#,
        )
        .bind(receivable_id)
        .bind(input.user_id)
        .bind(receivable_type)
        .bind(input.source_id)
        .bind(input.bill_amount)
        .bind(input.discount_amount)
        .bind(input.final_amount)
        .bind(ReceivableStatus::Pending.as_str())
        .bind(input.due_date)
        .fetch_one(&self.pool)
        .await
    }

    async fn fetch_by_source(
        &self,
        receivable_type: &str,
        source_id: i64,
    ) -> Result<Option<Receivable>, sqlx::Error> {
        sqlx::query_as::<_, Receivable>(
            r#"
            SELECT receivable_id, user_id, receivable_type, source_id, bill_amount, discount_amount, final_amount, status, due_date, created_at, updated_at
            FROM receivables
            WHERE receivable_type = $1 AND source_id = $2
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(receivable_type)
        .bind(source_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn resolve_create_conflict(
        &self,
        receivable_type: &str,
        source_id: Option<i64>,
    ) -> Result<Receivable, AppError> {
        let source_id = source_id.ok_or_else(|| {
            AppError::DatabaseError(anyhow::anyhow!(
                "Unique violation on a receivable without a source id"
            ))
        })?;

        let existing = self
            .fetch_by_source(receivable_type, source_id)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!(
                    "Failed to read receivable after conflict: {}",
                    e
                ))
            })?;

        let existing = existing.ok_or_else(|| {
            AppError::DatabaseError(anyhow::anyhow!(
                "Receivable for {} source {} vanished after unique violation",
                receivable_type,
                source_id
            ))
        })?;

        info!(
            receivable_id = %existing.receivable_id,
            source_id = source_id,
            "Concurrent creation detected, returning surviving row"
        );

        Ok(existing)
    }

    /// Get a receivable by ID.
    #[instrument(skip(self), fields(receivable_id = %receivable_id))]
    pub async fn get_receivable(
        &self,
        receivable_id: Uuid,
    ) -> Result<Option<Receivable>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_receivable"])
            .start_timer();

        let receivable = sqlx::query_as::<_, Receivable>(
            r#"
            SELECT receivable_id, user_id, receivable_type, source_id, bill_amount, discount_amount, final_amount, status, due_date, created_at, updated_at
            FROM receivables
            WHERE receivable_id = $1
            "#,
        )
        .bind(receivable_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get receivable: {}", e)))?;

        timer.observe_duration();

        Ok(receivable)
    }

    /// Get the receivable created for a specific business record.
    #[instrument(skip(self), fields(receivable_type = %receivable_type, source_id = source_id))]
    pub async fn get_receivable_by_source(
        &self,
        receivable_type: &str,
        source_id: i64,
    ) -> Result<Option<Receivable>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_receivable_by_source"])
            .start_timer();

        let receivable = self
            .fetch_by_source(&receivable_type.trim().to_lowercase(), source_id)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!(
                    "Failed to get receivable by source: {}",
                    e
                ))
            })?;

        timer.observe_duration();

        Ok(receivable)
    }

    /// List a member's receivables, newest first.
    #[instrument(skip(self), fields(user_id = user_id))]
    pub async fn list_receivables_for_user(
        &self,
        user_id: i64,
    ) -> Result<Vec<Receivable>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_receivables_for_user"])
            .start_timer();

        let receivables = sqlx::query_as::<_, Receivable>(
            r#"
            SELECT receivable_id, user_id, receivable_type, source_id, bill_amount, discount_amount, final_amount, status, due_date, created_at, updated_at
            FROM receivables
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list receivables: {}", e))
        })?;

        timer.observe_duration();

        Ok(receivables)
    }

    /// List unpaid receivables whose due date has passed, oldest due first.
    #[instrument(skip(self))]
    pub async fn get_overdue_receivables(&self) -> Result<Vec<Receivable>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_overdue_receivables"])
            .start_timer();

        let receivables = sqlx::query_as::<_, Receivable>(
            r#"
            SELECT receivable_id, user_id, receivable_type, source_id, bill_amount, discount_amount, final_amount, status, due_date, created_at, updated_at
            FROM receivables
            WHERE due_date IS NOT NULL AND due_date < CURRENT_DATE AND status <> 'paid'
            ORDER BY due_date ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list overdue receivables: {}", e))
        })?;

        timer.observe_duration();

        Ok(receivables)
    }

    /// Cancel a receivable.
    ///
    /// Only `pending` and `partial` receivables can be cancelled. Cancelling
    /// an already-cancelled receivable is a no-op; a settled one is refused.
    #[instrument(skip(self), fields(receivable_id = %receivable_id))]
    pub async fn cancel_receivable(&self, receivable_id: Uuid) -> Result<Receivable, AppError> {
        let current = self.get_receivable(receivable_id).await?.ok_or_else(|| {
            AppError::NotFound(anyhow::anyhow!("Receivable {} not found", receivable_id))
        })?;

        match current.parsed_status() {
            ReceivableStatus::Cancelled => return Ok(current),
            ReceivableStatus::Paid => {
                return Err(AppError::Conflict(anyhow::anyhow!(
                    "Receivable {} is settled and cannot be cancelled",
                    receivable_id
                )));
            }
            _ => {}
        }

        let timer = DB_QUERY_DURATION
            .with_label_values(&["cancel_receivable"])
            .start_timer();

        let updated = sqlx::query_as::<_, Receivable>(
            r#"
            UPDATE receivables
            SET status = 'cancelled', updated_at = now()
            WHERE receivable_id = $1 AND status IN ('pending', 'partial')
            RETURNING receivable_id, user_id, receivable_type, source_id, bill_amount, discount_amount, final_amount, status, due_date, created_at, updated_at
            "#,
        )
        .bind(receivable_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to cancel receivable: {}", e))
        })?;

        timer.observe_duration();

        match updated {
            Some(receivable) => {
                record_status_transition(&receivable.status);
                info!(receivable_id = %receivable.receivable_id, "Receivable cancelled");
                Ok(receivable)
            }
            None => {
                // Raced with a concurrent transition; re-read and decide.
                let current = self.get_receivable(receivable_id).await?.ok_or_else(|| {
                    AppError::NotFound(anyhow::anyhow!("Receivable {} not found", receivable_id))
                })?;
                if current.parsed_status() == ReceivableStatus::Cancelled {
                    Ok(current)
                } else {
                    Err(AppError::Conflict(anyhow::anyhow!(
                        "Receivable {} is settled and cannot be cancelled",
                        receivable_id
                    )))
                }
            }
        }
    }

    /// Delete all of a member's receivables. Payment lines go with them via
    /// the FK cascade. Returns the number of receivables removed.
    #[instrument(skip(self), fields(user_id = user_id))]
    pub async fn delete_receivables_for_user(&self, user_id: i64) -> Result<u64, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_receivables_for_user"])
            .start_timer();

        let result = sqlx::query("DELETE FROM receivables WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to delete receivables: {}", e))
            })?;

        timer.observe_duration();

        let deleted = result.rows_affected();
        if deleted > 0 {
            info!(
                user_id = user_id,
                deleted = deleted,
                "Receivables deleted for user"
            );
        }

        Ok(deleted)
    }

    // -------------------------------------------------------------------------
    // Transaction Ledger Operations
    // -------------------------------------------------------------------------

    /// Record a batch of payment lines against a receivable.
    ///
    /// All lines are inserted in a single database transaction: either every
    /// line exists afterwards or none does. An empty batch is a no-op. The
    /// receivable's status is not touched here; reconciliation is a separate
    /// step.
    #[instrument(
        skip(self, lines),
        fields(receivable_id = %receivable_id, line_count = lines.len())
    )]
    pub async fn create_transactions(
        &self,
        receivable_id: Uuid,
        lines: &[PaymentLine],
        created_by: Option<i64>,
    ) -> Result<Vec<Transaction>, AppError> {
        if lines.is_empty() {
            return Ok(Vec::new());
        }

        // The receivable must exist before any line is written.
        self.get_receivable(receivable_id).await?.ok_or_else(|| {
            AppError::NotFound(anyhow::anyhow!("Receivable {} not found", receivable_id))
        })?;

        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_transactions"])
            .start_timer();

        let result = retry_db_call(&self.retry, "create_transactions", || {
            self.insert_transaction_batch(receivable_id, lines, created_by)
        })
        .await;

        let transactions = match result {
            Ok(transactions) => transactions,
            Err(sqlx::Error::Database(ref db_err)) if db_err.is_foreign_key_violation() => {
                return Err(AppError::NotFound(anyhow::anyhow!(
                    "Receivable {} not found",
                    receivable_id
                )));
            }
            Err(e) => {
                record_error("create_transactions");
                return Err(AppError::DatabaseError(anyhow::anyhow!(
                    "Failed to record payment lines: {}",
                    e
                )));
            }
        };

        timer.observe_duration();

        let total: Decimal = transactions.iter().map(|t| t.amount).sum();
        for transaction in &transactions {
            record_transaction_recorded(&transaction.method);
        }

        info!(
            receivable_id = %receivable_id,
            line_count = transactions.len(),
            total = %total,
            "Payment lines recorded"
        );

        Ok(transactions)
    }

    async fn insert_transaction_batch(
        &self,
        receivable_id: Uuid,
        lines: &[PaymentLine],
        created_by: Option<i64>,
    ) -> Result<Vec<Transaction>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = Vec::with_capacity(lines.len());

        for line in lines {
            let transaction = sqlx::query_as::<_, Transaction>(
                r#"
                INSERT INTO transactions (transaction_id, receivable_id, method, amount, reference, created_by)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING transaction_id, receivable_id, method, amount, reference, created_by, created_at
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(receivable_id)
            .bind(line.method())
            .bind(line.amount())
            .bind(line.reference())
            .bind(created_by)
            .fetch_one(&mut *tx)
            .await?;

            inserted.push(transaction);
        }

        tx.commit().await?;
        Ok(inserted)
    }

    /// Total received against a receivable. Zero when no lines exist.
    #[instrument(skip(self), fields(receivable_id = %receivable_id))]
    pub async fn sum_received(&self, receivable_id: Uuid) -> Result<Decimal, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["sum_received"])
            .start_timer();

        let total = self
            .fetch_received_total(receivable_id)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to sum payments: {}", e))
            })?;

        timer.observe_duration();

        Ok(total)
    }

    async fn fetch_received_total(&self, receivable_id: Uuid) -> Result<Decimal, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT COALESCE(SUM(amount), 0) FROM transactions WHERE receivable_id = $1",
        )
        .bind(receivable_id)
        .fetch_one(&self.pool)
        .await
    }

    /// Received totals per payment method for one receivable, largest first.
    #[instrument(skip(self), fields(receivable_id = %receivable_id))]
    pub async fn sum_by_method(&self, receivable_id: Uuid) -> Result<Vec<MethodTotal>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["sum_by_method"])
            .start_timer();

        let methods = sqlx::query_as::<_, MethodTotal>(
            r#"
            SELECT method, SUM(amount) AS total, COUNT(*) AS count
            FROM transactions
            WHERE receivable_id = $1
            GROUP BY method
            ORDER BY total DESC
            "#,
        )
        .bind(receivable_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to sum payments by method: {}", e))
        })?;

        timer.observe_duration();

        Ok(methods)
    }

    /// List the payment lines recorded against a receivable, oldest first.
    #[instrument(skip(self), fields(receivable_id = %receivable_id))]
    pub async fn get_transactions(
        &self,
        receivable_id: Uuid,
    ) -> Result<Vec<Transaction>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_transactions"])
            .start_timer();

        let transactions = sqlx::query_as::<_, Transaction>(
            r#"
            SELECT transaction_id, receivable_id, method, amount, reference, created_by, created_at
            FROM transactions
            WHERE receivable_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(receivable_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list transactions: {}", e))
        })?;

        timer.observe_duration();

        Ok(transactions)
    }

    /// A receivable with its received total, balance and per-method split.
    #[instrument(skip(self), fields(receivable_id = %receivable_id))]
    pub async fn get_receivable_breakdown(
        &self,
        receivable_id: Uuid,
    ) -> Result<Option<ReceivableBreakdown>, AppError> {
        let receivable = match self.get_receivable(receivable_id).await? {
            Some(receivable) => receivable,
            None => return Ok(None),
        };

        let total_received = self.sum_received(receivable_id).await?;
        let methods = self.sum_by_method(receivable_id).await?;
        let balance = receivable.final_amount - total_received;

        Ok(Some(ReceivableBreakdown {
            receivable,
            total_received,
            balance,
            methods,
        }))
    }

    // -------------------------------------------------------------------------
    // Status Reconciliation
    // -------------------------------------------------------------------------

    /// Recompute a receivable's status from its ledger.
    ///
    /// Cancelled receivables are returned untouched. Idempotent over an
    /// unchanged ledger; on failure the stored status is left as it was.
    #[instrument(skip(self), fields(receivable_id = %receivable_id))]
    pub async fn update_receivable_status(
        &self,
        receivable_id: Uuid,
    ) -> Result<Receivable, AppError> {
        let current = self.get_receivable(receivable_id).await?.ok_or_else(|| {
            AppError::NotFound(anyhow::anyhow!("Receivable {} not found", receivable_id))
        })?;

        // Terminal: recorded lines never resurrect a cancelled receivable.
        if current.parsed_status().is_terminal() {
            return Ok(current);
        }

        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_receivable_status"])
            .start_timer();

        let result = retry_db_call(&self.retry, "update_receivable_status", || {
            self.apply_derived_status(receivable_id, current.final_amount)
        })
        .await;

        timer.observe_duration();

        match result {
            Ok(Some(updated)) => {
                if updated.status != current.status {
                    record_status_transition(&updated.status);
                    info!(
                        receivable_id = %receivable_id,
                        from = %current.status,
                        to = %updated.status,
                        "Receivable status updated"
                    );
                }
                Ok(updated)
            }
            // The guarded update matched nothing: a concurrent cancellation won.
            Ok(None) => self.get_receivable(receivable_id).await?.ok_or_else(|| {
                AppError::NotFound(anyhow::anyhow!("Receivable {} not found", receivable_id))
            }),
            Err(e) => {
                record_error("update_receivable_status");
                Err(AppError::ReconciliationError(anyhow::anyhow!(
                    "Failed to recompute status for receivable {}: {}",
                    receivable_id,
                    e
                )))
            }
        }
    }

    async fn apply_derived_status(
        &self,
        receivable_id: Uuid,
        final_amount: Decimal,
    ) -> Result<Option<Receivable>, sqlx::Error> {
        let total_received = self.fetch_received_total(receivable_id).await?;
        let status = ReceivableStatus::from_amounts(final_amount, total_received);

        sqlx::query_as::<_, Receivable>(
            r#"
            UPDATE receivables
            SET status = $1, updated_at = now()
            WHERE receivable_id = $2 AND status <> 'cancelled'
            RETURNING receivable_id, user_id, receivable_type, source_id, bill_amount, discount_amount, final_amount, status, due_date, created_at, updated_at
            "#,
        )
        .bind(status.as_str())
        .bind(receivable_id)
        .fetch_optional(&self.pool)
        .await
    }
}

fn validate_receivable(input: &CreateReceivable) -> Result<String, AppError> {
    if input.user_id <= 0 {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "user_id must be positive, got {}",
            input.user_id
        )));
    }

    let receivable_type = input.receivable_type.trim().to_lowercase();
    if receivable_type.is_empty() {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "receivable_type must not be empty"
        )));
    }
    if receivable_type.len() > 50 {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "receivable_type must be at most 50 characters"
        )));
    }

    if input.bill_amount < Decimal::ZERO
        || input.discount_amount < Decimal::ZERO
        || input.final_amount < Decimal::ZERO
    {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Amounts must not be negative"
        )));
    }

    Ok(receivable_type)
}

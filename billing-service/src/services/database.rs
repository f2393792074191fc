//! Datastore contract and its PostgreSQL implementation.

use crate::models::{Billing, BillingStatus, BillingSummary, CreateBilling};
use crate::services::metrics::DB_QUERY_DURATION;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, instrument, warn};

/// Errors surfaced by [`BillingStore`] operations.
///
/// `Unavailable` is retryable under the workflow's activity retry policy;
/// `NotFound` and `AlreadyExists` are permanent.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found")]
    NotFound,

    #[error("already exists")]
    AlreadyExists,

    #[error("datastore unavailable: {0}")]
    Unavailable(#[source] anyhow::Error),
}

impl StoreError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }

    fn unavailable(context: &'static str, err: sqlx::Error) -> Self {
        StoreError::Unavailable(anyhow::anyhow!("{}: {}", context, err))
    }
}

/// The datastore operations the billing system depends on.
///
/// Only `close_billing` and `create_summary` must be idempotent: the
/// workflow may retry them after a successful but unacknowledged attempt.
#[async_trait]
pub trait BillingStore: Send + Sync {
    /// Look up a billing row by its external (UUIDv7) id.
    async fn get_billing_by_external_id(&self, external_id: &str) -> Result<Billing, StoreError>;

    /// Insert a billing row with status `open`, returning the internal id.
    async fn create_billing(&self, input: &CreateBilling) -> Result<i64, StoreError>;

    /// Insert a line item, keyed by the internal billing id.
    async fn add_line_item(
        &self,
        billing_id: i64,
        description: &str,
        amount_minor: i64,
    ) -> Result<(), StoreError>;

    /// Transition a billing to `closed`, stamping `actual_closed_at`.
    /// A no-op when the row is already closed.
    async fn close_billing(
        &self,
        billing_id: i64,
        actual_closed_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Insert the serialized summary document. A uniqueness collision is
    /// reported as `AlreadyExists`.
    async fn create_summary(
        &self,
        external_id: &str,
        summary: &serde_json::Value,
    ) -> Result<(), StoreError>;

    /// Fetch the persisted summary for a closed billing.
    async fn get_summary(&self, external_id: &str) -> Result<BillingSummary, StoreError>;

    /// Liveness probe for health endpoints.
    async fn health_check(&self) -> Result<(), StoreError>;
}

/// PostgreSQL-backed [`BillingStore`].
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "billing-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, StoreError> {
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
            .map_err(|e| StoreError::unavailable("failed to connect", e))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), StoreError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Unavailable(anyhow::anyhow!("migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }
}

#[async_trait]
impl BillingStore for Database {
    #[instrument(skip(self), fields(external_billing_id = %external_id))]
    async fn get_billing_by_external_id(&self, external_id: &str) -> Result<Billing, StoreError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_billing_by_external_id"])
            .start_timer();

        let billing = sqlx::query_as::<_, Billing>(
            r#"
            SELECT id, external_billing_id, user_id, description, currency, currency_precision, status, planned_closed_at, actual_closed_at, created_at, updated_at
            FROM billings
            WHERE external_billing_id = $1
            "#,
        )
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::unavailable("failed to get billing", e))?;

        timer.observe_duration();

        match billing {
            Some(billing) => Ok(billing),
            None => {
                warn!("Billing not found");
                Err(StoreError::NotFound)
            }
        }
    }

    #[instrument(skip(self, input), fields(external_billing_id = %input.external_billing_id, user_id = %input.user_id))]
    async fn create_billing(&self, input: &CreateBilling) -> Result<i64, StoreError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_billing"])
            .start_timer();

        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO billings (external_billing_id, user_id, description, currency, currency_precision, status, planned_closed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(&input.external_billing_id)
        .bind(&input.user_id)
        .bind(&input.description)
        .bind(&input.currency)
        .bind(input.currency_precision)
        .bind(BillingStatus::Open.as_str())
        .bind(input.planned_closed_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::unavailable("failed to create billing", e))?;

        timer.observe_duration();
        info!(billing_id = id, "Billing created");

        Ok(id)
    }

    #[instrument(skip(self), fields(billing_id = billing_id, amount_minor = amount_minor))]
    async fn add_line_item(
        &self,
        billing_id: i64,
        description: &str,
        amount_minor: i64,
    ) -> Result<(), StoreError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["add_line_item"])
            .start_timer();

        sqlx::query(
            r#"
            INSERT INTO line_items (billing_id, description, amount_minor)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(billing_id)
        .bind(description)
        .bind(amount_minor)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::unavailable("failed to add line item", e))?;

        timer.observe_duration();
        info!("Line item added");

        Ok(())
    }

    #[instrument(skip(self), fields(billing_id = billing_id))]
    async fn close_billing(
        &self,
        billing_id: i64,
        actual_closed_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["close_billing"])
            .start_timer();

        // The status guard keeps retries from re-stamping actual_closed_at.
        let result = sqlx::query(
            r#"
            UPDATE billings
            SET status = $2, actual_closed_at = $3, updated_at = now()
            WHERE id = $1 AND status <> $2
            "#,
        )
        .bind(billing_id)
        .bind(BillingStatus::Closed.as_str())
        .bind(actual_closed_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::unavailable("failed to close billing", e))?;

        timer.observe_duration();

        if result.rows_affected() == 0 {
            info!("Billing already closed, close is a no-op");
        } else {
            info!("Billing closed");
        }

        Ok(())
    }

    #[instrument(skip(self, summary), fields(external_billing_id = %external_id))]
    async fn create_summary(
        &self,
        external_id: &str,
        summary: &serde_json::Value,
    ) -> Result<(), StoreError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_summary"])
            .start_timer();

        let result = sqlx::query(
            r#"
            INSERT INTO billing_summaries (external_billing_id, summary)
            VALUES ($1, $2)
            "#,
        )
        .bind(external_id)
        .bind(summary)
        .execute(&self.pool)
        .await;

        timer.observe_duration();

        match result {
            Ok(_) => {
                info!("Billing summary created");
                Ok(())
            }
            Err(sqlx::Error::Database(ref db_err)) if db_err.is_unique_violation() => {
                warn!("Billing summary already exists");
                Err(StoreError::AlreadyExists)
            }
            Err(e) => Err(StoreError::unavailable("failed to create summary", e)),
        }
    }

    #[instrument(skip(self), fields(external_billing_id = %external_id))]
    async fn get_summary(&self, external_id: &str) -> Result<BillingSummary, StoreError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_summary"])
            .start_timer();

        let row: Option<(serde_json::Value,)> = sqlx::query_as(
            r#"
            SELECT summary FROM billing_summaries WHERE external_billing_id = $1
            "#,
        )
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::unavailable("failed to get summary", e))?;

        timer.observe_duration();

        match row {
            Some((value,)) => serde_json::from_value(value).map_err(|e| {
                StoreError::Unavailable(anyhow::anyhow!("malformed summary document: {}", e))
            }),
            None => {
                warn!("Billing summary not found");
                Err(StoreError::NotFound)
            }
        }
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), StoreError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["health_check"])
            .start_timer();

        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::unavailable("health check failed", e))?;

        timer.observe_duration();
        Ok(())
    }
}

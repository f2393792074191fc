//! Side-effectful activities invoked from the billing workflow.
//!
//! Every activity runs under the workflow's retry policy. Only
//! `close_billing` and `create_summary` may be retried after a successful
//! but unacknowledged attempt, and both are idempotent at the datastore.

use crate::models::CreateBilling;
use crate::services::{BillingStore, StoreError};
use crate::workflow::retry::{execute_activity, ActivityRetryPolicy};
use crate::workflow::state::{BillingWorkflowInput, LineItemState};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, instrument};

pub struct BillingActivities {
    store: Arc<dyn BillingStore>,
    retry_policy: ActivityRetryPolicy,
}

impl BillingActivities {
    pub fn new(store: Arc<dyn BillingStore>) -> Self {
        Self::with_retry_policy(store, ActivityRetryPolicy::default())
    }

    pub fn with_retry_policy(store: Arc<dyn BillingStore>, retry_policy: ActivityRetryPolicy) -> Self {
        Self {
            store,
            retry_policy,
        }
    }

    /// Insert the billing row, returning the internal id.
    #[instrument(skip(self, input), fields(external_billing_id = %input.external_billing_id))]
    pub async fn start_billing(&self, input: &BillingWorkflowInput) -> Result<i64, StoreError> {
        let create = CreateBilling {
            user_id: input.user_id.clone(),
            external_billing_id: input.external_billing_id.clone(),
            description: input.description.clone(),
            currency: input.currency.clone(),
            currency_precision: input.currency_precision,
            planned_closed_at: input.planned_closed_at,
        };

        let billing_id = execute_activity(&self.retry_policy, "start_billing", || {
            self.store.create_billing(&create)
        })
        .await?;

        info!(billing_id = billing_id, "Billing started");
        Ok(billing_id)
    }

    /// Insert a line item row for the billing's internal id.
    #[instrument(skip(self, item), fields(billing_id = billing_id, amount_minor = item.amount_minor))]
    pub async fn add_line_item(
        &self,
        billing_id: i64,
        item: &LineItemState,
    ) -> Result<(), StoreError> {
        execute_activity(&self.retry_policy, "add_line_item", || {
            self.store
                .add_line_item(billing_id, &item.description, item.amount_minor)
        })
        .await
    }

    /// Flip the billing row to closed, stamping `actual_closed_at`.
    #[instrument(skip(self), fields(billing_id = billing_id))]
    pub async fn close_billing(
        &self,
        billing_id: i64,
        actual_closed_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        execute_activity(&self.retry_policy, "close_billing", || {
            self.store.close_billing(billing_id, actual_closed_at)
        })
        .await
    }

    /// Persist the serialized summary document. A uniqueness collision means
    /// a prior attempt landed, so it counts as success.
    #[instrument(skip(self, summary), fields(external_billing_id = %external_billing_id))]
    pub async fn create_summary(
        &self,
        external_billing_id: &str,
        summary: &serde_json::Value,
    ) -> Result<(), StoreError> {
        match execute_activity(&self.retry_policy, "create_summary", || {
            self.store.create_summary(external_billing_id, summary)
        })
        .await
        {
            Ok(()) => Ok(()),
            Err(StoreError::AlreadyExists) => {
                info!("Billing summary already persisted, treating as success");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }
}

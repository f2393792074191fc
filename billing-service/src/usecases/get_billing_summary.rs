use crate::models::BillingSummary;
use crate::services::{record_billing_operation, BillingStore, StoreError};
use crate::usecases::BillingError;
use crate::workflow::BillingWorkflows;
use std::sync::Arc;
use tracing::{error, instrument, warn};

pub struct GetBillingSummaryUsecase {
    store: Arc<dyn BillingStore>,
    workflows: Arc<dyn BillingWorkflows>,
}

impl GetBillingSummaryUsecase {
    pub fn new(store: Arc<dyn BillingStore>, workflows: Arc<dyn BillingWorkflows>) -> Self {
        Self { store, workflows }
    }

    /// Return the persisted summary for a closed billing, or synthesize one
    /// from the workflow's live state while it is still open.
    #[instrument(skip(self), fields(external_billing_id = %external_billing_id))]
    pub async fn execute(&self, external_billing_id: &str) -> Result<BillingSummary, BillingError> {
        let billing = self
            .store
            .get_billing_by_external_id(external_billing_id)
            .await
            .map_err(|e| match e {
                StoreError::NotFound => {
                    warn!("Billing not found");
                    BillingError::BillingNotFound
                }
                other => {
                    error!(error = %other, "Failed to read billing row");
                    BillingError::DatastoreUnavailable
                }
            })?;

        record_billing_operation("summary_read");

        if billing.is_open() {
            let state = self
                .workflows
                .current_state(external_billing_id)
                .await
                .map_err(|e| {
                    error!(error = %e, "Failed to query billing workflow state");
                    BillingError::WorkflowFailed
                })?;
            return Ok(BillingSummary::from(&state));
        }

        match self.store.get_summary(external_billing_id).await {
            Ok(summary) => Ok(summary),
            Err(StoreError::NotFound) => {
                warn!("Billing summary not found");
                Err(BillingError::SummaryNotFound)
            }
            Err(e) => {
                error!(error = %e, "Failed to read billing summary");
                Err(BillingError::DatastoreUnavailable)
            }
        }
    }
}

use crate::services::{record_billing_operation, BillingStore, StoreError};
use crate::usecases::BillingError;
use crate::workflow::BillingWorkflows;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

pub struct CloseBillingUsecase {
    store: Arc<dyn BillingStore>,
    workflows: Arc<dyn BillingWorkflows>,
}

impl CloseBillingUsecase {
    pub fn new(store: Arc<dyn BillingStore>, workflows: Arc<dyn BillingWorkflows>) -> Self {
        Self { store, workflows }
    }

    /// Signal the workflow to close. The row read is a best-effort
    /// preflight; the workflow guarantees the single terminal transition.
    #[instrument(skip(self), fields(external_billing_id = %external_billing_id))]
    pub async fn execute(&self, external_billing_id: &str) -> Result<(), BillingError> {
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

        if !billing.is_open() {
            warn!("Billing is not open");
            return Err(BillingError::BillingNotOpen);
        }

        self.workflows
            .close_billing(external_billing_id)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to signal close-billing");
                BillingError::FailedToCloseBillingInWorkflow
            })?;

        record_billing_operation("closed");
        info!(billing_id = billing.id, "Billing close requested");

        Ok(())
    }
}

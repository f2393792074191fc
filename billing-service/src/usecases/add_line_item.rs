use crate::models::{has_at_most_decimals, to_minor_units};
use crate::services::{record_billing_operation, BillingStore, StoreError};
use crate::usecases::BillingError;
use crate::workflow::{BillingWorkflows, LineItemState};
use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

pub struct AddLineItemUsecase {
    store: Arc<dyn BillingStore>,
    workflows: Arc<dyn BillingWorkflows>,
}

impl AddLineItemUsecase {
    pub fn new(store: Arc<dyn BillingStore>, workflows: Arc<dyn BillingWorkflows>) -> Self {
        Self { store, workflows }
    }

    /// Validate against the billing row, convert the amount to minor units,
    /// and signal the workflow.
    ///
    /// The row read is a best-effort preflight; the workflow re-checks its
    /// own state when it processes the signal.
    #[instrument(skip(self), fields(external_billing_id = %external_billing_id, amount = amount))]
    pub async fn execute(
        &self,
        external_billing_id: &str,
        description: &str,
        amount: f64,
    ) -> Result<(), BillingError> {
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

        if !has_at_most_decimals(amount, billing.currency_precision) {
            warn!(
                precision = billing.currency_precision,
                "Amount has too many decimals"
            );
            return Err(BillingError::AmountHasTooManyDecimals);
        }

        let item = LineItemState {
            description: description.to_string(),
            amount_minor: to_minor_units(amount, billing.currency_precision),
            added_at: Utc::now(),
        };

        self.workflows
            .add_line_item(external_billing_id, item)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to signal add-line-item");
                BillingError::FailedToAddLineItemToWorkflow
            })?;

        record_billing_operation("line_item_added");
        info!("Line item added");

        Ok(())
    }
}

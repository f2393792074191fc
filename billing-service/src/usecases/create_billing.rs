use crate::models::MAX_PRECISION;
use crate::services::{record_billing_operation, FxProvider};
use crate::usecases::BillingError;
use crate::workflow::{BillingWorkflowInput, BillingWorkflows};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

pub struct CreateBillingUsecase {
    fx: Arc<dyn FxProvider>,
    workflows: Arc<dyn BillingWorkflows>,
}

impl CreateBillingUsecase {
    pub fn new(fx: Arc<dyn FxProvider>, workflows: Arc<dyn BillingWorkflows>) -> Self {
        Self { fx, workflows }
    }

    /// Validate the currency, mint the external id, resolve precision, and
    /// start the billing workflow. Returns the external billing id.
    #[instrument(skip(self), fields(user_id = %user_id, currency = %currency))]
    pub async fn execute(
        &self,
        user_id: &str,
        description: &str,
        currency: &str,
        planned_closed_at: Option<DateTime<Utc>>,
    ) -> Result<String, BillingError> {
        let supported = self
            .fx
            .supported_currencies(Utc::now())
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to fetch supported currencies");
                BillingError::FxUnavailable
            })?;
        if !supported.iter().any(|code| code == currency) {
            warn!("Currency not supported");
            return Err(BillingError::CurrencyNotSupported);
        }

        let external_billing_id = Uuid::now_v7().to_string();

        let metadata = self
            .fx
            .currency_metadata(currency, Utc::now())
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to fetch currency metadata");
                BillingError::CurrencyMetadataNotFound
            })?;
        if !(0..=MAX_PRECISION).contains(&metadata.precision) {
            warn!(precision = metadata.precision, "Currency precision out of range");
            return Err(BillingError::CurrencyMetadataNotFound);
        }

        let input = BillingWorkflowInput {
            user_id: user_id.to_string(),
            external_billing_id: external_billing_id.clone(),
            description: description.to_string(),
            currency: currency.to_string(),
            currency_precision: metadata.precision,
            planned_closed_at,
        };

        self.workflows.start_billing(input).await.map_err(|e| {
            error!(error = %e, "Failed to start billing workflow");
            BillingError::FailedToStartBillingWorkflow
        })?;

        record_billing_operation("created");
        info!(external_billing_id = %external_billing_id, "Billing created");

        Ok(external_billing_id)
    }
}

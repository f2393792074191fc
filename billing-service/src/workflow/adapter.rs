//! Domain-level adapter over the workflow engine: derives workflow ids and
//! translates billing operations into engine starts, signals, and queries.

use crate::workflow::engine::{EngineError, WorkflowEngine};
use crate::workflow::state::{
    BillingWorkflowInput, BillingWorkflowState, LineItemState, ADD_LINE_ITEM_SIGNAL,
    CLOSE_BILLING_SIGNAL, CURRENT_STATE_QUERY,
};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

const WORKFLOW_ID_PREFIX: &str = "billing-";

/// Deterministic workflow id for a billing.
pub fn workflow_id(external_billing_id: &str) -> String {
    format!("{}{}", WORKFLOW_ID_PREFIX, external_billing_id)
}

/// The workflow operations the use-case layer depends on. Tests substitute
/// fakes; production wires [`EngineBillingWorkflows`].
#[async_trait]
pub trait BillingWorkflows: Send + Sync {
    async fn start_billing(&self, input: BillingWorkflowInput) -> Result<(), EngineError>;

    async fn add_line_item(
        &self,
        external_billing_id: &str,
        item: LineItemState,
    ) -> Result<(), EngineError>;

    async fn close_billing(&self, external_billing_id: &str) -> Result<(), EngineError>;

    async fn current_state(
        &self,
        external_billing_id: &str,
    ) -> Result<BillingWorkflowState, EngineError>;
}

pub struct EngineBillingWorkflows {
    engine: Arc<WorkflowEngine>,
}

impl EngineBillingWorkflows {
    pub fn new(engine: Arc<WorkflowEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl BillingWorkflows for EngineBillingWorkflows {
    async fn start_billing(&self, input: BillingWorkflowInput) -> Result<(), EngineError> {
        let id = workflow_id(&input.external_billing_id);
        info!(workflow_id = %id, "Starting billing workflow");
        self.engine.start_workflow(&id, input)
    }

    async fn add_line_item(
        &self,
        external_billing_id: &str,
        item: LineItemState,
    ) -> Result<(), EngineError> {
        let payload = serde_json::to_value(&item).map_err(EngineError::BadPayload)?;
        self.engine
            .signal(&workflow_id(external_billing_id), ADD_LINE_ITEM_SIGNAL, payload)
    }

    async fn close_billing(&self, external_billing_id: &str) -> Result<(), EngineError> {
        self.engine.signal(
            &workflow_id(external_billing_id),
            CLOSE_BILLING_SIGNAL,
            serde_json::Value::Object(Default::default()),
        )
    }

    async fn current_state(
        &self,
        external_billing_id: &str,
    ) -> Result<BillingWorkflowState, EngineError> {
        self.engine
            .query(&workflow_id(external_billing_id), CURRENT_STATE_QUERY)
    }
}

//! Workflow input, signal, and state types.

use crate::models::{BillingStatus, BillingSummary, SummaryLineItem};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Signal name for appending a line item to an open billing.
pub const ADD_LINE_ITEM_SIGNAL: &str = "add-line-item";

/// Signal name for closing a billing manually.
pub const CLOSE_BILLING_SIGNAL: &str = "close-billing";

/// Query name for reading the live workflow state.
pub const CURRENT_STATE_QUERY: &str = "currentState";

/// Input handed to a billing workflow at start.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingWorkflowInput {
    pub user_id: String,
    pub external_billing_id: String,
    pub description: String,
    pub currency: String,
    pub currency_precision: i64,
    pub planned_closed_at: Option<DateTime<Utc>>,
}

/// Payload of the `add-line-item` signal, kept in state in delivery order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItemState {
    pub description: String,
    pub amount_minor: i64,
    pub added_at: DateTime<Utc>,
}

/// A signal after the engine has decoded it off the wire.
#[derive(Debug, Clone)]
pub enum WorkflowSignal {
    AddLineItem(LineItemState),
    Close,
}

/// Live workflow state, exposed via the `currentState` query.
///
/// Skipped fields are internal bookkeeping and never leave the process.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingWorkflowState {
    pub external_billing_id: String,
    #[serde(skip)]
    pub billing_id: i64,
    pub description: String,
    pub currency: String,
    pub currency_precision: i64,
    #[serde(skip)]
    pub status: BillingStatus,
    pub line_items: Vec<LineItemState>,
    #[serde(skip)]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub last_activity: DateTime<Utc>,
    pub total_amount_minor: i64,
}

impl BillingWorkflowState {
    pub(crate) fn new(input: &BillingWorkflowInput, now: DateTime<Utc>) -> Self {
        Self {
            external_billing_id: input.external_billing_id.clone(),
            billing_id: 0,
            description: input.description.clone(),
            currency: input.currency.clone(),
            currency_precision: input.currency_precision,
            status: BillingStatus::Open,
            line_items: Vec::new(),
            closed_at: None,
            last_activity: now,
            total_amount_minor: 0,
        }
    }
}

impl From<&BillingWorkflowState> for BillingSummary {
    fn from(state: &BillingWorkflowState) -> Self {
        BillingSummary {
            external_id: state.external_billing_id.clone(),
            description: state.description.clone(),
            currency: state.currency.clone(),
            currency_precision: state.currency_precision,
            line_items: state
                .line_items
                .iter()
                .map(|item| SummaryLineItem {
                    description: item.description.clone(),
                    amount_minor: item.amount_minor,
                })
                .collect(),
            total_amount_minor: state.total_amount_minor,
        }
    }
}

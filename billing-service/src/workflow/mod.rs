//! The durable billing workflow.
//!
//! One workflow instance per billing, addressed by the id
//! `"billing-" + external_billing_id`. The engine runs each instance as a
//! single-threaded task that serially multiplexes signal delivery and the
//! auto-close timer, invokes datastore activities under a retry policy, and
//! serves `currentState` queries from state published only between events.

mod activities;
mod adapter;
mod definition;
mod engine;
mod retry;
mod state;

pub use activities::BillingActivities;
pub use adapter::{workflow_id, BillingWorkflows, EngineBillingWorkflows};
pub use engine::{EngineError, WorkflowEngine};
pub use retry::ActivityRetryPolicy;
pub use state::{
    BillingWorkflowInput, BillingWorkflowState, LineItemState, WorkflowSignal,
    ADD_LINE_ITEM_SIGNAL, CLOSE_BILLING_SIGNAL, CURRENT_STATE_QUERY,
};

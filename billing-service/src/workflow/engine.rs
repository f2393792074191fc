//! In-process workflow engine: a registry of running billing workflows with
//! start/signal/query operations keyed by workflow id.
//!
//! Each workflow runs as its own tokio task and consumes events one at a
//! time, so signal handlers are mutually exclusive for free and queries
//! only ever observe state published between events.

use crate::services::metrics::record_workflow_signal;
use crate::workflow::activities::BillingActivities;
use crate::workflow::definition::run_billing_workflow;
use crate::workflow::state::{
    BillingWorkflowInput, BillingWorkflowState, WorkflowSignal, ADD_LINE_ITEM_SIGNAL,
    CLOSE_BILLING_SIGNAL, CURRENT_STATE_QUERY,
};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tokio::sync::{mpsc, watch};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("workflow engine unavailable")]
    Unavailable,

    #[error("workflow {0} not found")]
    NotFound(String),

    #[error("workflow {0} already exists")]
    AlreadyExists(String),

    #[error("workflow {0} is not signalable")]
    NotSignalable(String),

    #[error("workflow {0} failed")]
    Failed(String),

    #[error("unknown signal: {0}")]
    UnknownSignal(String),

    #[error("unknown query: {0}")]
    UnknownQuery(String),

    #[error("malformed signal payload: {0}")]
    BadPayload(#[source] serde_json::Error),
}

const RUN_RUNNING: u8 = 0;
const RUN_COMPLETED: u8 = 1;
const RUN_FAILED: u8 = 2;

struct WorkflowHandle {
    signals: mpsc::UnboundedSender<WorkflowSignal>,
    state: watch::Receiver<BillingWorkflowState>,
    run: Arc<AtomicU8>,
}

pub struct WorkflowEngine {
    activities: Arc<BillingActivities>,
    workflows: RwLock<HashMap<String, WorkflowHandle>>,
}

impl WorkflowEngine {
    pub fn new(activities: Arc<BillingActivities>) -> Self {
        Self {
            activities,
            workflows: RwLock::new(HashMap::new()),
        }
    }

    /// Launch a workflow. Returns once the engine has durably accepted the
    /// start; the workflow's first activity runs asynchronously.
    pub fn start_workflow(
        &self,
        workflow_id: &str,
        input: BillingWorkflowInput,
    ) -> Result<(), EngineError> {
        let mut workflows = self.workflows.write().map_err(|_| EngineError::Unavailable)?;

        if workflows.contains_key(workflow_id) {
            return Err(EngineError::AlreadyExists(workflow_id.to_string()));
        }

        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(BillingWorkflowState::new(&input, Utc::now()));
        let run = Arc::new(AtomicU8::new(RUN_RUNNING));

        let activities = self.activities.clone();
        let id = workflow_id.to_string();
        tokio::spawn({
            let run = run.clone();
            async move {
                match run_billing_workflow(input, activities, signal_rx, state_tx).await {
                    Ok(()) => {
                        run.store(RUN_COMPLETED, Ordering::SeqCst);
                    }
                    Err(e) => {
                        run.store(RUN_FAILED, Ordering::SeqCst);
                        tracing::error!(workflow_id = %id, error = %e, "Billing workflow failed");
                    }
                }
            }
        });

        workflows.insert(
            workflow_id.to_string(),
            WorkflowHandle {
                signals: signal_tx,
                state: state_rx,
                run,
            },
        );

        Ok(())
    }

    /// Deliver a named signal. Signals to a finished workflow fail with
    /// `NotSignalable`.
    pub fn signal(
        &self,
        workflow_id: &str,
        name: &str,
        payload: serde_json::Value,
    ) -> Result<(), EngineError> {
        let workflows = self.workflows.read().map_err(|_| EngineError::Unavailable)?;
        let handle = workflows
            .get(workflow_id)
            .ok_or_else(|| EngineError::NotFound(workflow_id.to_string()))?;

        if handle.run.load(Ordering::SeqCst) != RUN_RUNNING {
            return Err(EngineError::NotSignalable(workflow_id.to_string()));
        }

        let signal = match name {
            ADD_LINE_ITEM_SIGNAL => WorkflowSignal::AddLineItem(
                serde_json::from_value(payload).map_err(EngineError::BadPayload)?,
            ),
            CLOSE_BILLING_SIGNAL => WorkflowSignal::Close,
            other => return Err(EngineError::UnknownSignal(other.to_string())),
        };

        record_workflow_signal(name);

        handle
            .signals
            .send(signal)
            .map_err(|_| EngineError::NotSignalable(workflow_id.to_string()))
    }

    /// Serve a query against the workflow's last published state.
    pub fn query(&self, workflow_id: &str, name: &str) -> Result<BillingWorkflowState, EngineError> {
        if name != CURRENT_STATE_QUERY {
            return Err(EngineError::UnknownQuery(name.to_string()));
        }

        let workflows = self.workflows.read().map_err(|_| EngineError::Unavailable)?;
        let handle = workflows
            .get(workflow_id)
            .ok_or_else(|| EngineError::NotFound(workflow_id.to_string()))?;

        if handle.run.load(Ordering::SeqCst) == RUN_FAILED {
            return Err(EngineError::Failed(workflow_id.to_string()));
        }

        let state = handle.state.borrow().clone();
        Ok(state)
    }
}

//! The billing workflow definition: a per-billing state machine that
//! serially absorbs signals, arms the auto-close timer, and performs the
//! closure sub-protocol exactly once.

use crate::models::{BillingStatus, BillingSummary};
use crate::services::StoreError;
use crate::workflow::activities::BillingActivities;
use crate::workflow::state::{BillingWorkflowInput, BillingWorkflowState, WorkflowSignal};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tracing::{error, info};

/// Fatal workflow outcomes. The billing row stays `open`; queries against a
/// failed workflow surface an internal error.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("failed to create billing: {0}")]
    StartBilling(#[source] StoreError),

    #[error("line item total overflowed 64-bit minor units")]
    TotalOverflow,
}

/// The workflow's only source of time. Workflow code never reads the wall
/// clock directly.
struct WorkflowClock;

impl WorkflowClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn instant_at(&self, at: DateTime<Utc>) -> tokio::time::Instant {
        let delta = (at - self.now()).to_std().unwrap_or(Duration::ZERO);
        tokio::time::Instant::now() + delta
    }
}

pub(crate) async fn run_billing_workflow(
    input: BillingWorkflowInput,
    activities: Arc<BillingActivities>,
    mut signals: mpsc::UnboundedReceiver<WorkflowSignal>,
    state_tx: watch::Sender<BillingWorkflowState>,
) -> Result<(), WorkflowError> {
    let clock = WorkflowClock;
    let mut state = BillingWorkflowState::new(&input, clock.now());

    info!(
        external_billing_id = %input.external_billing_id,
        currency = %input.currency,
        planned_closed_at = ?input.planned_closed_at,
        "Billing workflow starting"
    );

    // Nothing is signalable until the row exists; a permanent failure here
    // fails the workflow before any signal is consumed.
    state.billing_id = activities
        .start_billing(&input)
        .await
        .map_err(WorkflowError::StartBilling)?;
    let _ = state_tx.send(state.clone());

    let auto_close_deadline = input.planned_closed_at.map(|at| clock.instant_at(at));
    let auto_close = async {
        match auto_close_deadline {
            Some(deadline) => tokio::time::sleep_until(deadline).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(auto_close);
    let mut timer_pending = auto_close_deadline.is_some();

    while state.status == BillingStatus::Open {
        tokio::select! {
            biased;

            signal = signals.recv() => match signal {
                Some(WorkflowSignal::AddLineItem(item)) => {
                    info!(
                        description = %item.description,
                        amount_minor = item.amount_minor,
                        "Received add-line-item signal"
                    );
                    match activities.add_line_item(state.billing_id, &item).await {
                        Ok(()) => {
                            state.total_amount_minor = state
                                .total_amount_minor
                                .checked_add(item.amount_minor)
                                .ok_or(WorkflowError::TotalOverflow)?;
                            state.line_items.push(item);
                            state.last_activity = clock.now();
                        }
                        Err(e) => {
                            // At-least-once delivery plus a retried activity:
                            // the item is dropped and the workflow keeps serving.
                            error!(error = %e, "Failed to add line item, dropping signal");
                        }
                    }
                }
                Some(WorkflowSignal::Close) => {
                    info!("Received close-billing signal");
                    close_and_summarize(&mut state, &activities, &clock).await?;
                }
                None => break,
            },

            _ = &mut auto_close, if timer_pending => {
                timer_pending = false;
                if state.status == BillingStatus::Closed {
                    info!("Auto-close timer fired but billing already closed");
                } else {
                    info!("Auto-close timer fired");
                    close_and_summarize(&mut state, &activities, &clock).await?;
                }
            }
        }

        let _ = state_tx.send(state.clone());
    }

    info!(external_billing_id = %state.external_billing_id, "Billing workflow completed");
    Ok(())
}

/// The closure sub-protocol: close the row, persist the summary, then flip
/// the in-memory state to closed. Activity failure leaves the billing open
/// so a later close can finish the job.
async fn close_and_summarize(
    state: &mut BillingWorkflowState,
    activities: &BillingActivities,
    clock: &WorkflowClock,
) -> Result<(), WorkflowError> {
    if state.status == BillingStatus::Closed {
        return Ok(());
    }

    info!("Closing billing");

    let actual_closed_at = clock.now();
    if let Err(e) = activities
        .close_billing(state.billing_id, actual_closed_at)
        .await
    {
        error!(error = %e, "Failed to close billing");
        return Ok(());
    }

    let summary = BillingSummary::from(&*state);
    let document = match serde_json::to_value(&summary) {
        Ok(document) => document,
        Err(e) => {
            error!(error = %e, "Failed to serialize billing summary");
            return Ok(());
        }
    };

    if let Err(e) = activities
        .create_summary(&state.external_billing_id, &document)
        .await
    {
        error!(error = %e, "Failed to create billing summary");
        return Ok(());
    }

    state.status = BillingStatus::Closed;
    state.closed_at = Some(actual_closed_at);
    state.last_activity = actual_closed_at;

    info!("Billing closed and summary persisted");
    Ok(())
}

//! Workflow-level tests driven through the engine adapter, with the
//! datastore faked in memory.

mod common;

use billing_service::models::BillingStatus;
use billing_service::services::BillingStore;
use billing_service::workflow::{
    BillingActivities, BillingWorkflowInput, BillingWorkflowState, BillingWorkflows,
    EngineBillingWorkflows, EngineError, LineItemState, WorkflowEngine,
};
use chrono::{DateTime, Utc};
use common::{fast_retry_policy, InMemoryStore};
use std::sync::Arc;
use std::time::Duration;

fn harness() -> (Arc<InMemoryStore>, EngineBillingWorkflows) {
    let store = Arc::new(InMemoryStore::new());
    let dyn_store: Arc<dyn BillingStore> = store.clone();
    let activities = Arc::new(BillingActivities::with_retry_policy(
        dyn_store,
        fast_retry_policy(),
    ));
    let engine = Arc::new(WorkflowEngine::new(activities));
    (store, EngineBillingWorkflows::new(engine))
}

fn input(external_id: &str, planned_closed_at: Option<DateTime<Utc>>) -> BillingWorkflowInput {
    BillingWorkflowInput {
        user_id: "u1".to_string(),
        external_billing_id: external_id.to_string(),
        description: "test billing".to_string(),
        currency: "USD".to_string(),
        currency_precision: 2,
        planned_closed_at,
    }
}

fn item(description: &str, amount_minor: i64) -> LineItemState {
    LineItemState {
        description: description.to_string(),
        amount_minor,
        added_at: Utc::now(),
    }
}

async fn wait_for_state(
    workflows: &EngineBillingWorkflows,
    external_id: &str,
    predicate: impl Fn(&BillingWorkflowState) -> bool,
) -> Option<BillingWorkflowState> {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        if let Ok(state) = workflows.current_state(external_id).await {
            if predicate(&state) {
                return Some(state);
            }
        }
        if tokio::time::Instant::now() >= deadline {
            return None;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn processes_signals_in_delivery_order() {
    let (store, workflows) = harness();
    workflows.start_billing(input("b-1", None)).await.unwrap();

    for (i, amount) in [100, 250, 7].iter().enumerate() {
        workflows
            .add_line_item("b-1", item(&format!("item-{}", i), *amount))
            .await
            .unwrap();
    }

    let state = wait_for_state(&workflows, "b-1", |s| s.line_items.len() == 3)
        .await
        .expect("all line items processed");

    assert_eq!(state.total_amount_minor, 357);
    let descriptions: Vec<_> = state
        .line_items
        .iter()
        .map(|li| li.description.as_str())
        .collect();
    assert_eq!(descriptions, vec!["item-0", "item-1", "item-2"]);
    assert_eq!(store.line_item_count(), 3);
}

#[tokio::test]
async fn close_persists_summary_and_completes() {
    let (store, workflows) = harness();
    workflows.start_billing(input("b-2", None)).await.unwrap();

    workflows
        .add_line_item("b-2", item("only", 500))
        .await
        .unwrap();
    wait_for_state(&workflows, "b-2", |s| s.line_items.len() == 1)
        .await
        .unwrap();

    workflows.close_billing("b-2").await.unwrap();

    let state = wait_for_state(&workflows, "b-2", |s| s.status == BillingStatus::Closed)
        .await
        .expect("workflow closes");
    assert!(state.closed_at.is_some());

    let row = store.billing("b-2").unwrap();
    assert_eq!(row.status, "closed");
    assert!(row.actual_closed_at.is_some());

    let summary = store.summary("b-2").expect("summary persisted");
    assert_eq!(summary["externalId"], "b-2");
    assert_eq!(summary["totalAmountMinor"], 500);
    assert_eq!(summary["lineItems"][0]["amountMinor"], 500);
}

#[tokio::test]
async fn signals_after_close_are_not_signalable() {
    let (store, workflows) = harness();
    workflows.start_billing(input("b-3", None)).await.unwrap();
    wait_for_state(&workflows, "b-3", |s| s.billing_id != 0)
        .await
        .unwrap();

    workflows.close_billing("b-3").await.unwrap();

    // Once the workflow completes, the engine refuses further signals.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        match workflows.add_line_item("b-3", item("late", 1)).await {
            Err(EngineError::NotSignalable(_)) => break,
            Ok(()) | Err(_) => {
                assert!(
                    tokio::time::Instant::now() < deadline,
                    "expected NotSignalable after completion"
                );
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        }
    }

    // A late signal that was accepted mid-close never mutates the summary.
    let summary = store.summary("b-3").expect("summary persisted");
    assert_eq!(summary["lineItems"].as_array().unwrap().len(), 0);
    assert_eq!(summary["totalAmountMinor"], 0);
}

#[tokio::test]
async fn double_close_produces_single_terminal_transition() {
    let (store, workflows) = harness();
    workflows.start_billing(input("b-4", None)).await.unwrap();
    wait_for_state(&workflows, "b-4", |s| s.billing_id != 0)
        .await
        .unwrap();

    workflows.close_billing("b-4").await.unwrap();
    // The second close may land in the queue or hit NotSignalable; either
    // way there is exactly one closure.
    let _ = workflows.close_billing("b-4").await;

    wait_for_state(&workflows, "b-4", |s| s.status == BillingStatus::Closed)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(store.summary_count(), 1);
    assert_eq!(store.closed_transitions(), 1);
}

#[tokio::test]
async fn line_item_dropped_when_activity_exhausts_retries() {
    let (store, workflows) = harness();
    workflows.start_billing(input("b-5", None)).await.unwrap();
    wait_for_state(&workflows, "b-5", |s| s.billing_id != 0)
        .await
        .unwrap();

    store.fail_line_items(true);
    workflows
        .add_line_item("b-5", item("doomed", 100))
        .await
        .unwrap();

    // 3 fast attempts fail; the item is dropped and the workflow keeps going.
    tokio::time::sleep(Duration::from_millis(300)).await;
    store.fail_line_items(false);

    workflows
        .add_line_item("b-5", item("kept", 200))
        .await
        .unwrap();

    let state = wait_for_state(&workflows, "b-5", |s| s.line_items.len() == 1)
        .await
        .expect("surviving line item processed");
    assert_eq!(state.line_items[0].description, "kept");
    assert_eq!(state.total_amount_minor, 200);

    workflows.close_billing("b-5").await.unwrap();
    wait_for_state(&workflows, "b-5", |s| s.status == BillingStatus::Closed)
        .await
        .unwrap();

    let summary = store.summary("b-5").unwrap();
    assert_eq!(summary["lineItems"].as_array().unwrap().len(), 1);
    assert_eq!(summary["totalAmountMinor"], 200);
}

#[tokio::test]
async fn total_overflow_is_fatal_and_leaves_billing_open() {
    let (store, workflows) = harness();
    workflows.start_billing(input("b-6", None)).await.unwrap();
    wait_for_state(&workflows, "b-6", |s| s.billing_id != 0)
        .await
        .unwrap();

    workflows
        .add_line_item("b-6", item("max", i64::MAX))
        .await
        .unwrap();
    wait_for_state(&workflows, "b-6", |s| s.line_items.len() == 1)
        .await
        .unwrap();

    workflows
        .add_line_item("b-6", item("straw", 1))
        .await
        .unwrap();

    // The workflow fails; queries now report the failure.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        match workflows.current_state("b-6").await {
            Err(EngineError::Failed(_)) => break,
            _ => {
                assert!(
                    tokio::time::Instant::now() < deadline,
                    "expected workflow failure on overflow"
                );
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        }
    }

    // No summary, and the row stays open.
    assert_eq!(store.summary_count(), 0);
    assert_eq!(store.billing("b-6").unwrap().status, "open");
}

#[tokio::test]
async fn auto_close_timer_runs_closure_protocol() {
    let (store, workflows) = harness();
    let planned = Utc::now() + chrono::Duration::milliseconds(150);
    workflows
        .start_billing(input("b-7", Some(planned)))
        .await
        .unwrap();

    let state = wait_for_state(&workflows, "b-7", |s| s.status == BillingStatus::Closed)
        .await
        .expect("timer closes the billing");
    assert!(state.closed_at.is_some());
    assert_eq!(store.summary_count(), 1);
    assert_eq!(store.closed_transitions(), 1);
}

#[tokio::test]
async fn failed_start_never_accepts_signals() {
    let (store, workflows) = harness();
    store.fail_create_billing(true);

    workflows.start_billing(input("b-8", None)).await.unwrap();

    // All retries fail; the workflow fails before consuming any signal.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        match workflows.add_line_item("b-8", item("never", 1)).await {
            Err(EngineError::NotSignalable(_)) => break,
            _ => {
                assert!(
                    tokio::time::Instant::now() < deadline,
                    "expected NotSignalable after start failure"
                );
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        }
    }

    assert_eq!(store.billing_count(), 0);
    assert_eq!(store.line_item_count(), 0);
}

#[tokio::test]
async fn duplicate_workflow_start_is_rejected() {
    let (_store, workflows) = harness();
    workflows.start_billing(input("b-9", None)).await.unwrap();

    let err = workflows
        .start_billing(input("b-9", None))
        .await
        .expect_err("second start must fail");
    assert!(matches!(err, EngineError::AlreadyExists(_)));
}

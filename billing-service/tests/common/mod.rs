//! Test helper module for billing-service integration tests.
//!
//! Provides an in-memory datastore fake and an application spawner so the
//! HTTP surface and the workflow can be exercised without PostgreSQL.

#![allow(dead_code)]

use async_trait::async_trait;
use billing_service::config::{BillingConfig, DatabaseConfig, WorkflowConfig};
use billing_service::models::{Billing, BillingStatus, BillingSummary, CreateBilling, LineItemRow};
use billing_service::services::{init_metrics, BillingStore, StaticFxProvider, StoreError};
use billing_service::startup::Application;
use billing_service::workflow::ActivityRetryPolicy;
use chrono::{DateTime, Utc};
use service_core::config::Config as CoreConfig;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// In-memory [`BillingStore`] with failure injection for activity paths.
pub struct InMemoryStore {
    inner: Mutex<Inner>,
    next_id: AtomicI64,
    closed_transitions: AtomicU32,
    fail_create_billing: AtomicBool,
    fail_line_items: AtomicBool,
}

#[derive(Default)]
struct Inner {
    billings: Vec<Billing>,
    line_items: Vec<LineItemRow>,
    summaries: HashMap<String, serde_json::Value>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            next_id: AtomicI64::new(1),
            closed_transitions: AtomicU32::new(0),
            fail_create_billing: AtomicBool::new(false),
            fail_line_items: AtomicBool::new(false),
        }
    }

    pub fn fail_create_billing(&self, fail: bool) {
        self.fail_create_billing.store(fail, Ordering::SeqCst);
    }

    pub fn fail_line_items(&self, fail: bool) {
        self.fail_line_items.store(fail, Ordering::SeqCst);
    }

    pub fn billing(&self, external_id: &str) -> Option<Billing> {
        self.inner
            .lock()
            .unwrap()
            .billings
            .iter()
            .find(|b| b.external_billing_id == external_id)
            .cloned()
    }

    pub fn billing_count(&self) -> usize {
        self.inner.lock().unwrap().billings.len()
    }

    pub fn line_item_count(&self) -> usize {
        self.inner.lock().unwrap().line_items.len()
    }

    pub fn summary_count(&self) -> usize {
        self.inner.lock().unwrap().summaries.len()
    }

    pub fn summary(&self, external_id: &str) -> Option<serde_json::Value> {
        self.inner.lock().unwrap().summaries.get(external_id).cloned()
    }

    /// Number of open-to-closed transitions actually applied to rows.
    pub fn closed_transitions(&self) -> u32 {
        self.closed_transitions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BillingStore for InMemoryStore {
    async fn get_billing_by_external_id(&self, external_id: &str) -> Result<Billing, StoreError> {
        self.billing(external_id).ok_or(StoreError::NotFound)
    }

    async fn create_billing(&self, input: &CreateBilling) -> Result<i64, StoreError> {
        if self.fail_create_billing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(anyhow::anyhow!("injected failure")));
        }

        let mut inner = self.inner.lock().unwrap();
        if inner
            .billings
            .iter()
            .any(|b| b.external_billing_id == input.external_billing_id)
        {
            return Err(StoreError::Unavailable(anyhow::anyhow!(
                "duplicate external billing id"
            )));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let now = Utc::now();
        inner.billings.push(Billing {
            id,
            external_billing_id: input.external_billing_id.clone(),
            user_id: input.user_id.clone(),
            description: input.description.clone(),
            currency: input.currency.clone(),
            currency_precision: input.currency_precision,
            status: BillingStatus::Open.as_str().to_string(),
            planned_closed_at: input.planned_closed_at,
            actual_closed_at: None,
            created_at: now,
            updated_at: now,
        });
        Ok(id)
    }

    async fn add_line_item(
        &self,
        billing_id: i64,
        description: &str,
        amount_minor: i64,
    ) -> Result<(), StoreError> {
        if self.fail_line_items.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(anyhow::anyhow!("injected failure")));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.inner.lock().unwrap().line_items.push(LineItemRow {
            id,
            billing_id,
            description: description.to_string(),
            amount_minor,
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn close_billing(
        &self,
        billing_id: i64,
        actual_closed_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(billing) = inner.billings.iter_mut().find(|b| b.id == billing_id) {
            if billing.status != BillingStatus::Closed.as_str() {
                billing.status = BillingStatus::Closed.as_str().to_string();
                billing.actual_closed_at = Some(actual_closed_at);
                billing.updated_at = actual_closed_at;
                self.closed_transitions.fetch_add(1, Ordering::SeqCst);
            }
        }
        Ok(())
    }

    async fn create_summary(
        &self,
        external_id: &str,
        summary: &serde_json::Value,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.summaries.contains_key(external_id) {
            return Err(StoreError::AlreadyExists);
        }
        inner
            .summaries
            .insert(external_id.to_string(), summary.clone());
        Ok(())
    }

    async fn get_summary(&self, external_id: &str) -> Result<BillingSummary, StoreError> {
        let value = self
            .summary(external_id)
            .ok_or(StoreError::NotFound)?;
        serde_json::from_value(value)
            .map_err(|e| StoreError::Unavailable(anyhow::anyhow!("malformed summary: {}", e)))
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Retry settings tight enough for tests: 3 attempts, millisecond backoff.
pub fn fast_workflow_config() -> WorkflowConfig {
    WorkflowConfig {
        activity_start_to_close_ms: 1_000,
        activity_initial_backoff_ms: 10,
        activity_backoff_coefficient: 2.0,
        activity_max_backoff_ms: 50,
        activity_max_attempts: 3,
    }
}

pub fn fast_retry_policy() -> ActivityRetryPolicy {
    fast_workflow_config().retry_policy()
}

/// Test application wrapper for integration tests.
pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub store: Arc<InMemoryStore>,
    pub client: reqwest::Client,
}

impl TestApp {
    /// Spawn a new test application on a random port over an in-memory
    /// datastore.
    pub async fn spawn() -> Self {
        init_metrics();

        let store = Arc::new(InMemoryStore::new());
        let config = BillingConfig {
            common: CoreConfig {
                port: 0,
                log_level: "warn".to_string(),
            },
            service_name: "billing-service-test".to_string(),
            otlp_endpoint: None,
            database: DatabaseConfig {
                url: "postgres://unused".to_string(),
                max_connections: 1,
                min_connections: 1,
            },
            workflow: fast_workflow_config(),
        };

        let dyn_store: Arc<dyn BillingStore> = store.clone();
        let app = Application::build_with_store(config, dyn_store, Arc::new(StaticFxProvider::new()))
            .await
            .expect("Failed to build test application");
        let port = app.port();

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        let client = reqwest::Client::new();

        // Wait for the server to be ready by polling the health endpoint
        let health_url = format!("http://127.0.0.1:{}/health", port);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        TestApp {
            address: format!("http://127.0.0.1:{}", port),
            port,
            store,
            client,
        }
    }

    pub async fn post_json(&self, path: &str, body: &serde_json::Value) -> reqwest::Response {
        self.client
            .post(format!("{}{}", self.address, path))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn post_empty(&self, path: &str) -> reqwest::Response {
        self.client
            .post(format!("{}{}", self.address, path))
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(format!("{}{}", self.address, path))
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// Create a billing and wait for the workflow to persist the row.
    pub async fn create_open_billing(&self, body: serde_json::Value) -> String {
        let response = self.post_json("/billing", &body).await;
        assert_eq!(response.status(), 200, "create billing should succeed");
        let body: serde_json::Value = response.json().await.expect("valid json");
        let billing_id = body["billingId"].as_str().expect("billingId").to_string();

        let store = self.store.clone();
        let id = billing_id.clone();
        assert!(
            wait_until(Duration::from_secs(2), move || store.billing(&id).is_some()).await,
            "billing row should be persisted by the start activity"
        );

        billing_id
    }
}

/// Poll `f` every 10ms until it returns true or `timeout` elapses.
pub async fn wait_until(timeout: Duration, mut f: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if f() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

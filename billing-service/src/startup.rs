//! Application startup and lifecycle management.

use crate::config::BillingConfig;
use crate::http;
use crate::services::{
    get_metrics, init_metrics, BillingStore, Database, FxProvider, StaticFxProvider,
};
use crate::usecases::{
    AddLineItemUsecase, CloseBillingUsecase, CreateBillingUsecase, GetBillingSummaryUsecase,
};
use crate::workflow::{BillingActivities, BillingWorkflows, EngineBillingWorkflows, WorkflowEngine};
use axum::{
    extract::State, http::StatusCode, middleware, response::IntoResponse, routing::get, Json,
    Router,
};
use serde_json::json;
use service_core::error::AppError;
use service_core::middleware::metrics::metrics_middleware;
use service_core::middleware::tracing::request_id_middleware;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Shared state for the billing endpoints.
#[derive(Clone)]
pub struct AppState {
    pub create_billing: Arc<CreateBillingUsecase>,
    pub add_line_item: Arc<AddLineItemUsecase>,
    pub close_billing: Arc<CloseBillingUsecase>,
    pub get_billing_summary: Arc<GetBillingSummaryUsecase>,
}

/// State for health check endpoints.
#[derive(Clone)]
struct HealthState {
    store: Arc<dyn BillingStore>,
}

/// Health check endpoint for Docker/K8s liveness probes.
async fn health_check(State(state): State<HealthState>) -> impl IntoResponse {
    match state.store.health_check().await {
        Ok(_) => {
            tracing::debug!("Health check passed");
            (
                StatusCode::OK,
                Json(json!({
                    "status": "ok",
                    "service": "billing-service",
                    "version": env!("CARGO_PKG_VERSION")
                })),
            )
        }
        Err(e) => {
            tracing::warn!(error = %e, "Health check failed - datastore unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unhealthy",
                    "service": "billing-service",
                    "error": e.to_string()
                })),
            )
        }
    }
}

/// Readiness check endpoint for K8s readiness probes.
async fn readiness_check(State(state): State<HealthState>) -> impl IntoResponse {
    match state.store.health_check().await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

/// Metrics endpoint for Prometheus scraping.
async fn metrics_handler() -> impl IntoResponse {
    let metrics = get_metrics();
    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        metrics,
    )
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
    store: Arc<dyn BillingStore>,
}

impl Application {
    /// Build the application against PostgreSQL, running migrations.
    pub async fn build(config: BillingConfig) -> Result<Self, AppError> {
        let db = Database::new(
            &config.database.url,
            config.database.max_connections,
            config.database.min_connections,
        )
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to connect to PostgreSQL");
            AppError::DatabaseError(anyhow::Error::new(e))
        })?;

        db.run_migrations().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to run migrations");
            AppError::DatabaseError(anyhow::Error::new(e))
        })?;

        let store: Arc<dyn BillingStore> = Arc::new(db);
        Self::build_with_store(config, store, Arc::new(StaticFxProvider::new())).await
    }

    /// Build with an injected datastore and FX provider. Tests use this to
    /// substitute fakes; `build` wires the PostgreSQL store.
    pub async fn build_with_store(
        config: BillingConfig,
        store: Arc<dyn BillingStore>,
        fx: Arc<dyn FxProvider>,
    ) -> Result<Self, AppError> {
        init_metrics();

        let activities = Arc::new(BillingActivities::with_retry_policy(
            store.clone(),
            config.workflow.retry_policy(),
        ));
        let engine = Arc::new(WorkflowEngine::new(activities));
        let workflows: Arc<dyn BillingWorkflows> = Arc::new(EngineBillingWorkflows::new(engine));

        let state = AppState {
            create_billing: Arc::new(CreateBillingUsecase::new(fx.clone(), workflows.clone())),
            add_line_item: Arc::new(AddLineItemUsecase::new(store.clone(), workflows.clone())),
            close_billing: Arc::new(CloseBillingUsecase::new(store.clone(), workflows.clone())),
            get_billing_summary: Arc::new(GetBillingSummaryUsecase::new(
                store.clone(),
                workflows.clone(),
            )),
        };

        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!(error = %e, addr = %addr, "Failed to bind listener");
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(port = port, "Billing service listener bound");

        Ok(Self {
            port,
            listener,
            state,
            store,
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let health_state = HealthState {
            store: self.store.clone(),
        };

        let api = http::routes().with_state(self.state.clone());
        let ops = Router::new()
            .route("/health", get(health_check))
            .route("/ready", get(readiness_check))
            .route("/metrics", get(metrics_handler))
            .with_state(health_state);

        let router = api
            .merge(ops)
            .layer(TraceLayer::new_for_http())
            .layer(middleware::from_fn(metrics_middleware))
            .layer(middleware::from_fn(request_id_middleware));

        tracing::info!(
            service = "billing-service",
            version = env!("CARGO_PKG_VERSION"),
            port = self.port,
            "Service ready to accept connections"
        );

        axum::serve(self.listener, router).await
    }
}

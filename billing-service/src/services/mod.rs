//! Services module for billing-service.

pub mod database;
pub mod fx;
pub mod metrics;

pub use database::{BillingStore, Database, StoreError};
pub use fx::{FxError, FxProvider, StaticFxProvider};
pub use metrics::{
    get_metrics, init_metrics, record_billing_operation, record_error, record_workflow_signal,
};

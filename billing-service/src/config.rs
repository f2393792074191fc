//! Configuration for billing-service.

use crate::workflow::ActivityRetryPolicy;
use serde::Deserialize;
use service_core::config::Config as CoreConfig;
use service_core::error::AppError;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct BillingConfig {
    #[serde(default)]
    pub common: CoreConfig,

    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// OTLP collector endpoint; span export is disabled when unset.
    #[serde(default)]
    pub otlp_endpoint: Option<String>,

    pub database: DatabaseConfig,

    #[serde(default)]
    pub workflow: WorkflowConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Activity retry settings for the billing workflow.
#[derive(Debug, Deserialize, Clone)]
pub struct WorkflowConfig {
    #[serde(default = "default_start_to_close_ms")]
    pub activity_start_to_close_ms: u64,

    #[serde(default = "default_initial_backoff_ms")]
    pub activity_initial_backoff_ms: u64,

    #[serde(default = "default_backoff_coefficient")]
    pub activity_backoff_coefficient: f64,

    #[serde(default = "default_max_backoff_ms")]
    pub activity_max_backoff_ms: u64,

    #[serde(default = "default_max_attempts")]
    pub activity_max_attempts: u32,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            activity_start_to_close_ms: default_start_to_close_ms(),
            activity_initial_backoff_ms: default_initial_backoff_ms(),
            activity_backoff_coefficient: default_backoff_coefficient(),
            activity_max_backoff_ms: default_max_backoff_ms(),
            activity_max_attempts: default_max_attempts(),
        }
    }
}

impl WorkflowConfig {
    pub fn retry_policy(&self) -> ActivityRetryPolicy {
        ActivityRetryPolicy {
            start_to_close: Duration::from_millis(self.activity_start_to_close_ms),
            initial_interval: Duration::from_millis(self.activity_initial_backoff_ms),
            backoff_coefficient: self.activity_backoff_coefficient,
            maximum_interval: Duration::from_millis(self.activity_max_backoff_ms),
            maximum_attempts: self.activity_max_attempts,
        }
    }
}

impl BillingConfig {
    /// Load from an optional `configuration` file, overridden by `APP__*`
    /// environment variables.
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::File::with_name("configuration").required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        Ok(config.try_deserialize()?)
    }
}

fn default_service_name() -> String {
    "billing-service".to_string()
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_start_to_close_ms() -> u64 {
    30_000
}

fn default_initial_backoff_ms() -> u64 {
    1_000
}

fn default_backoff_coefficient() -> f64 {
    2.0
}

fn default_max_backoff_ms() -> u64 {
    60_000
}

fn default_max_attempts() -> u32 {
    10
}

//! Named errors returned by the use-case layer.
//!
//! Raw datastore, FX, and engine errors never cross this boundary; every
//! branch maps to one of these, with the cause preserved in logs only.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BillingError {
    #[error("currency not supported")]
    CurrencyNotSupported,

    #[error("failed to generate billing id")]
    FailedToGenerateBillingId,

    #[error("currency metadata not found")]
    CurrencyMetadataNotFound,

    #[error("failed to start billing workflow")]
    FailedToStartBillingWorkflow,

    #[error("billing not found")]
    BillingNotFound,

    #[error("billing is not open")]
    BillingNotOpen,

    #[error("amount has too many decimals")]
    AmountHasTooManyDecimals,

    #[error("failed to add line item to billing workflow")]
    FailedToAddLineItemToWorkflow,

    #[error("failed to close billing in workflow")]
    FailedToCloseBillingInWorkflow,

    #[error("billing summary not found")]
    SummaryNotFound,

    #[error("fx provider unavailable")]
    FxUnavailable,

    #[error("datastore unavailable")]
    DatastoreUnavailable,

    #[error("billing workflow failed")]
    WorkflowFailed,
}

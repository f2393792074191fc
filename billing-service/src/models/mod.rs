//! Domain models for billing-service.

mod amount;
mod billing;
mod summary;

pub use amount::{has_at_most_decimals, to_minor_units, MAX_PRECISION};
pub use billing::{Billing, BillingStatus, CreateBilling, CurrencyMetadata, LineItemRow};
pub use summary::{BillingSummary, SummaryLineItem};

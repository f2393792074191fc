//! Immutable billing summary produced on closure.

use serde::{Deserialize, Serialize};

/// The serialized summary document persisted in `billing_summaries` and
/// returned by the summary endpoint. Field order is the canonical wire
/// order; do not reorder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingSummary {
    pub external_id: String,
    pub description: String,
    pub currency: String,
    pub currency_precision: i64,
    pub line_items: Vec<SummaryLineItem>,
    pub total_amount_minor: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryLineItem {
    pub description: String,
    pub amount_minor: i64,
}

//! Billing row and status models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Billing status. Advances `open -> closed`, never backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingStatus {
    Open,
    Closed,
}

impl BillingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingStatus::Open => "open",
            BillingStatus::Closed => "closed",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "closed" => BillingStatus::Closed,
            _ => BillingStatus::Open,
        }
    }
}

/// A billing as persisted in the `billings` table.
///
/// `id` is the datastore-assigned internal id and never leaves the process;
/// `external_billing_id` (UUIDv7) is the only identifier used on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Billing {
    pub id: i64,
    pub external_billing_id: String,
    pub user_id: String,
    pub description: String,
    pub currency: String,
    pub currency_precision: i64,
    pub status: String,
    pub planned_closed_at: Option<DateTime<Utc>>,
    pub actual_closed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Billing {
    pub fn is_open(&self) -> bool {
        BillingStatus::from_string(&self.status) == BillingStatus::Open
    }
}

/// Input for inserting a billing row.
#[derive(Debug, Clone)]
pub struct CreateBilling {
    pub user_id: String,
    pub external_billing_id: String,
    pub description: String,
    pub currency: String,
    pub currency_precision: i64,
    pub planned_closed_at: Option<DateTime<Utc>>,
}

/// A line item as persisted in the `line_items` table.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LineItemRow {
    pub id: i64,
    pub billing_id: i64,
    pub description: String,
    pub amount_minor: i64,
    pub created_at: DateTime<Utc>,
}

/// Per-currency metadata from the FX provider.
///
/// A zero-filled value (empty code, precision 0) is what the provider
/// returns for an unknown code; callers that checked support first never
/// observe it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CurrencyMetadata {
    pub code: String,
    pub symbol: String,
    pub precision: i64,
}

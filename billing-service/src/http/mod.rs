//! Request façade: thin validation and error mapping over the use cases.

mod error;
mod handlers;

pub use error::ApiError;
pub use handlers::{
    AddLineItemRequest, CreateBillingRequest, CreateBillingResponse,
};

use crate::startup::AppState;
use axum::routing::{get, post};
use axum::Router;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/billing", post(handlers::create_billing))
        .route("/billing/:billing_id/line-item", post(handlers::add_line_item))
        .route("/billing/:billing_id/close", post(handlers::close_billing))
        .route("/billing/:billing_id/summary", get(handlers::get_billing_summary))
}

use crate::services::record_error;
use crate::usecases::BillingError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Error response of the billing API: a stable machine-readable `code` and
/// a human-readable `message`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "InvalidArgument",
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            code: "NotFound",
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "Internal",
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            code: &'static str,
            message: String,
        }

        record_error(self.code, "http");

        (
            self.status,
            Json(ErrorResponse {
                code: self.code,
                message: self.message,
            }),
        )
            .into_response()
    }
}

impl From<BillingError> for ApiError {
    fn from(err: BillingError) -> Self {
        match err {
            BillingError::CurrencyNotSupported => {
                ApiError::invalid_argument("currency not supported")
            }
            BillingError::AmountHasTooManyDecimals => {
                ApiError::invalid_argument("amount has too many decimals")
            }
            BillingError::BillingNotOpen => ApiError::invalid_argument("billing is not open"),
            BillingError::BillingNotFound => ApiError::not_found("billing not found"),
            BillingError::SummaryNotFound => ApiError::not_found("billing summary not found"),
            BillingError::FailedToGenerateBillingId => {
                ApiError::internal("failed to generate billing id")
            }
            BillingError::CurrencyMetadataNotFound => {
                ApiError::internal("currency metadata not found")
            }
            BillingError::FailedToStartBillingWorkflow => {
                ApiError::internal("failed to create billing")
            }
            BillingError::FailedToAddLineItemToWorkflow => {
                ApiError::internal("failed to add line item")
            }
            BillingError::FailedToCloseBillingInWorkflow => {
                ApiError::internal("failed to close billing")
            }
            BillingError::FxUnavailable => ApiError::internal("fx provider unavailable"),
            BillingError::DatastoreUnavailable => ApiError::internal("datastore unavailable"),
            BillingError::WorkflowFailed => ApiError::internal("billing workflow failed"),
        }
    }
}

//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::OrderError;
use tax_engine::{ErrorCategory, TaxError};

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// The request clashes with an existing resource.
    Conflict(String),
    /// Order could not be built or mutated.
    Order(OrderError),
    /// Tax computation or lifecycle call failed.
    Tax(TaxError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, error_body(msg)),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, error_body(msg)),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, error_body(msg)),
            ApiError::Order(err) => (StatusCode::UNPROCESSABLE_ENTITY, error_body(err.to_string())),
            ApiError::Tax(err) => tax_error_to_response(err),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, error_body(msg))
            }
        };

        (status, axum::Json(body)).into_response()
    }
}

fn error_body(message: String) -> serde_json::Value {
    serde_json::json!({ "error": message })
}

fn tax_error_to_response(err: TaxError) -> (StatusCode, serde_json::Value) {
    let category = err.category();
    let status = match category {
        ErrorCategory::Validation => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorCategory::Transport { retryable: true } => StatusCode::SERVICE_UNAVAILABLE,
        ErrorCategory::Transport { retryable: false } => StatusCode::BAD_GATEWAY,
        ErrorCategory::Consistency => StatusCode::CONFLICT,
        ErrorCategory::Persistence => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let mut body = serde_json::json!({
        "error": err.to_string(),
        "category": category,
        "recommended_action": err.recommended_action(),
    });
    if let TaxError::Consistency { summary, .. } = &err {
        body["summary"] = serde_json::to_value(&**summary).unwrap_or_default();
    }
    (status, body)
}

impl From<OrderError> for ApiError {
    fn from(err: OrderError) -> Self {
        ApiError::Order(err)
    }
}

impl From<TaxError> for ApiError {
    fn from(err: TaxError) -> Self {
        ApiError::Tax(err)
    }
}

impl From<tax_store::StoreError> for ApiError {
    fn from(err: tax_store::StoreError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::error;

use cafekiosk_core::DomainError;
use cafekiosk_infra::{OrderPlacementError, ProductServiceError, StatisticsError, StoreError};

/// Envelope of every response body.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub code: u16,
    pub status: String,
    pub message: String,
    pub data: Option<T>,
}

/// `BAD_REQUEST`, `UNPROCESSABLE_ENTITY`, ...
fn status_name(status: StatusCode) -> String {
    status
        .canonical_reason()
        .unwrap_or("UNKNOWN")
        .to_ascii_uppercase()
        .replace([' ', '-'], "_")
}

fn envelope<T: Serialize>(status: StatusCode, message: String, data: Option<T>) -> Response {
    (
        status,
        Json(ApiResponse {
            code: status.as_u16(),
            status: status_name(status),
            message,
            data,
        }),
    )
        .into_response()
}

pub fn ok<T: Serialize>(data: T) -> Response {
    envelope(StatusCode::OK, "OK".to_string(), Some(data))
}

pub fn json_error(status: StatusCode, message: impl Into<String>) -> Response {
    envelope::<()>(status, message.into(), None)
}

pub fn rejection_to_response(rejection: JsonRejection) -> Response {
    json_error(StatusCode::BAD_REQUEST, rejection.body_text())
}

pub fn domain_error_to_response(err: DomainError) -> Response {
    match err {
        DomainError::Validation(_) => json_error(StatusCode::BAD_REQUEST, err.to_string()),
        DomainError::Conflict(_) => json_error(StatusCode::CONFLICT, err.to_string()),
        DomainError::InvariantViolation(_) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, err.to_string())
        }
    }
}

pub fn store_error_to_response(err: StoreError) -> Response {
    match err {
        StoreError::Conflict(_) => json_error(StatusCode::CONFLICT, err.to_string()),
        StoreError::Database(_) | StoreError::InvalidRecord(_) => {
            error!(error = %err, "store failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal store error")
        }
    }
}

pub fn placement_error_to_response(err: OrderPlacementError) -> Response {
    match err {
        OrderPlacementError::EmptyRequest | OrderPlacementError::UnknownProduct(_) => {
            json_error(StatusCode::BAD_REQUEST, err.to_string())
        }
        OrderPlacementError::InsufficientStock(_) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, err.to_string())
        }
        OrderPlacementError::ConcurrentModification { .. } => {
            json_error(StatusCode::CONFLICT, err.to_string())
        }
        OrderPlacementError::Store(e) => store_error_to_response(e),
    }
}

pub fn product_error_to_response(err: ProductServiceError) -> Response {
    match err {
        ProductServiceError::Invalid(e) => domain_error_to_response(e),
        ProductServiceError::UnknownProduct(_) | ProductServiceError::NotStockTracked { .. } => {
            json_error(StatusCode::BAD_REQUEST, err.to_string())
        }
        ProductServiceError::Store(e) => store_error_to_response(e),
    }
}

pub fn statistics_error_to_response(err: StatisticsError) -> Response {
    match err {
        StatisticsError::MailDeliveryFailed { .. } => {
            json_error(StatusCode::BAD_GATEWAY, err.to_string())
        }
        StatisticsError::Domain(e) => domain_error_to_response(e),
        StatisticsError::Store(e) => store_error_to_response(e),
    }
}

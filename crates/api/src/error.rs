//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use booking::ReservationError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Bad request from the client.
    BadRequest(String),
    /// Lifecycle service error.
    Reservation(ReservationError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Reservation(err) => reservation_error_to_response(err),
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn reservation_error_to_response(err: ReservationError) -> (StatusCode, String) {
    let status = match &err {
        ReservationError::Validation(_) | ReservationError::InvalidStatusValue(_) => {
            StatusCode::BAD_REQUEST
        }
        ReservationError::ReservationNotFound(_) => StatusCode::NOT_FOUND,
        ReservationError::PropertyUnavailable
        | ReservationError::InvalidTransition { .. }
        | ReservationError::ReservationLocked(_)
        | ReservationError::CannotDeleteCompleted(_)
        | ReservationError::ConcurrentModification(_) => StatusCode::CONFLICT,
        ReservationError::PaymentInitiationFailed(_) => StatusCode::BAD_GATEWAY,
        ReservationError::UpstreamTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        ReservationError::Store(e) => {
            tracing::error!(error = %e, "store failure");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, err.to_string())
}

impl From<ReservationError> for ApiError {
    fn from(err: ReservationError) -> Self {
        ApiError::Reservation(err)
    }
}

//! Domain error types.

use thiserror::Error;

use crate::status::ReservationStatus;

/// A request field failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    /// Name of the offending request field.
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Errors raised by the pure reservation rules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// Missing or malformed input.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// A status string outside the reservation vocabulary.
    #[error("Invalid status value: {0}")]
    InvalidStatusValue(String),

    /// The state machine does not allow this move.
    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition {
        from: ReservationStatus,
        to: ReservationStatus,
    },
}

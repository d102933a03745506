//! Lifecycle service error types.

use common::ReservationId;
use domain::{DomainError, ReservationStatus, ValidationError};
use store::StoreError;
use thiserror::Error;

use crate::payment::PaymentError;

/// Errors returned by the reservation lifecycle service.
#[derive(Debug, Error)]
pub enum ReservationError {
    /// The request failed field validation.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Another active reservation occupies part of the requested stay.
    #[error("Property is not available for the requested dates")]
    PropertyUnavailable,

    #[error("Reservation not found: {0}")]
    ReservationNotFound(ReservationId),

    /// A status string outside the reservation vocabulary.
    #[error("Invalid status value: {0}")]
    InvalidStatusValue(String),

    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition {
        from: ReservationStatus,
        to: ReservationStatus,
    },

    /// The reservation is in a terminal status and cannot be edited.
    #[error("Reservation {0} is locked and cannot be modified")]
    ReservationLocked(ReservationId),

    #[error("Completed reservation {0} cannot be deleted")]
    CannotDeleteCompleted(ReservationId),

    /// Another writer kept changing the reservation while this one retried.
    #[error("Reservation {0} was modified concurrently")]
    ConcurrentModification(ReservationId),

    /// A store or gateway call exceeded its deadline.
    #[error("Upstream call timed out: {operation}")]
    UpstreamTimeout { operation: &'static str },

    /// The reservation was stored but the payment could not be started.
    #[error("Failed to initiate payment: {0}")]
    PaymentInitiationFailed(#[source] PaymentError),

    #[error("Store error: {0}")]
    Store(#[source] StoreError),
}

impl From<DomainError> for ReservationError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::Validation(e) => ReservationError::Validation(e),
            DomainError::InvalidStatusValue(value) => ReservationError::InvalidStatusValue(value),
            DomainError::InvalidTransition { from, to } => {
                ReservationError::InvalidTransition { from, to }
            }
        }
    }
}

impl From<StoreError> for ReservationError {
    fn from(e: StoreError) -> Self {
        match e {
            // A write lost the check-and-write race
            StoreError::Overlap { .. } => ReservationError::PropertyUnavailable,
            StoreError::NotFound(id) => ReservationError::ReservationNotFound(id),
            StoreError::VersionConflict { id, .. } => ReservationError::ConcurrentModification(id),
            other => ReservationError::Store(other),
        }
    }
}

/// Convenience type alias for lifecycle results.
pub type Result<T> = std::result::Result<T, ReservationError>;

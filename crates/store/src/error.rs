use common::{PropertyId, ReservationId};
use thiserror::Error;

/// Errors that can occur when interacting with the reservation store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Another active reservation already occupies part of the requested stay.
    /// Raised by writes that lost the check-and-write race.
    #[error("Overlapping reservation exists for property {property_id}")]
    Overlap { property_id: PropertyId },

    /// The reservation was not found in the store.
    #[error("Reservation not found: {0}")]
    NotFound(ReservationId),

    /// The stored reservation changed since it was read.
    #[error(
        "Concurrency conflict for reservation {id}: expected version {expected}, found {actual}"
    )]
    VersionConflict {
        id: ReservationId,
        expected: i64,
        actual: i64,
    },

    /// A reservation with this identifier is already stored.
    #[error("Reservation already exists: {0}")]
    AlreadyExists(ReservationId),

    /// A stored row could not be mapped back to a reservation.
    #[error("Invalid reservation record: {0}")]
    InvalidRecord(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

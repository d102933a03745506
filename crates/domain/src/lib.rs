//! Domain layer for the reservation service.
//!
//! This crate provides the pure reservation rules:
//! - Reservation aggregate and its mutation methods
//! - ReservationStatus state machine with the allowed transition table
//! - StayPeriod overlap rule used for double-booking detection
//! - Request types and field validation

pub mod error;
pub mod request;
pub mod reservation;
pub mod status;
pub mod stay;
pub mod value_objects;

pub use error::{DomainError, ValidationError};
pub use request::{NewReservation, ReservationChanges};
pub use reservation::Reservation;
pub use status::ReservationStatus;
pub use stay::StayPeriod;
pub use value_objects::{Attributes, Money};

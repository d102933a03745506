//! Shared types used across the reservation service crates.

pub mod types;

pub use types::{CustomerId, OrganizationId, PropertyId, ReservationId};

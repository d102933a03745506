//! Reservation persistence for the reservation service.
//!
//! This crate provides the storage port used by the lifecycle service:
//! - [`ReservationStore`] trait with atomic overlap-checked writes
//! - [`ReservationStoreExt`] read helpers built on [`ReservationQuery`]
//! - [`InMemoryReservationStore`] for tests and local runs
//! - [`PostgresReservationStore`] backed by sqlx

pub mod error;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::InMemoryReservationStore;
pub use postgres::PostgresReservationStore;
pub use query::{QueryOrder, ReservationQuery};
pub use store::{ReservationStore, ReservationStoreExt};

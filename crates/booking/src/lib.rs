//! Reservation lifecycle orchestration.
//!
//! This crate ties the domain rules to the persistence and payment ports:
//! - [`ReservationLifecycleService`] for create, read, edit and status operations
//! - [`AvailabilityChecker`] for the double-booking rule
//! - [`PaymentGateway`] port with in-memory and HTTP implementations

pub mod availability;
pub mod error;
pub mod payment;
pub mod service;
pub mod timeouts;

pub use availability::AvailabilityChecker;
pub use error::{ReservationError, Result};
pub use payment::{
    HttpPaymentGateway, InMemoryPaymentGateway, PaymentError, PaymentGateway, PaymentReference,
    PaymentRequest,
};
pub use service::ReservationLifecycleService;
pub use timeouts::Timeouts;

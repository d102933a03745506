//! Payment event consumption for the reservation service.
//!
//! The payment service publishes a JSON envelope for each payment action.
//! [`PaymentEventConsumer`] reads them from an [`EventTransport`] and confirms
//! the reservation when a payment succeeded.

pub mod consumer;
pub mod envelope;
pub mod error;
#[cfg(feature = "kafka")]
pub mod kafka;
pub mod transport;

pub use consumer::{HandleOutcome, PaymentConfirmer, PaymentEventConsumer};
pub use envelope::{ExternalId, MessageEnvelope, PaymentAction};
pub use error::{DecodeError, TransportError};
#[cfg(feature = "kafka")]
pub use kafka::{KafkaConfig, KafkaTransport};
pub use transport::{ChannelPublisher, ChannelTransport, EventTransport, TransportMessage, channel};

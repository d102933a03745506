//! Payment event error types.

use thiserror::Error;

/// Errors raised while turning raw bytes into a payment event.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The message is not a JSON envelope.
    #[error("Invalid envelope: {0}")]
    Envelope(#[source] serde_json::Error),

    /// The envelope payload does not match the payment action shape.
    #[error("Invalid payment action payload: {0}")]
    Payload(#[source] serde_json::Error),
}

/// Errors raised by a message transport.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Failed to receive message: {0}")]
    Receive(String),

    #[error("Failed to acknowledge message: {0}")]
    Acknowledge(String),

    #[error("Failed to publish message: {0}")]
    Publish(String),

    /// The transport could not be built from its configuration.
    #[error("Invalid transport configuration: {0}")]
    Config(String),
}

//! Wire format of payment service messages.

use std::fmt;

use common::ReservationId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DecodeError;

/// Message type of a payment outcome.
pub const PAYMENT_ACTION: &str = "PaymentAction";

/// Payment status meaning the money was collected.
pub const STATUS_SUCCEEDED: &str = "succeeded";

/// Identifier owned by another service, sent either as a number or a string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExternalId {
    Numeric(i64),
    Text(String),
}

impl fmt::Display for ExternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExternalId::Numeric(id) => write!(f, "{id}"),
            ExternalId::Text(id) => f.write_str(id),
        }
    }
}

/// Outer envelope shared by every message on the payment topic.
///
/// The payload stays raw until the message type is known.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageEnvelope {
    #[serde(default)]
    pub message_id: String,
    pub message_type: String,
    #[serde(default)]
    pub occurred_at: Option<String>,
    #[serde(default)]
    pub payload: Value,
    #[serde(default)]
    pub schema_version: Option<i32>,
}

impl MessageEnvelope {
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        serde_json::from_slice(bytes).map_err(DecodeError::Envelope)
    }

    pub fn is_payment_action(&self) -> bool {
        self.message_type == PAYMENT_ACTION
    }

    /// Decodes the payload as a payment action.
    pub fn payment_action(&self) -> Result<PaymentAction, DecodeError> {
        PaymentAction::deserialize(&self.payload).map_err(DecodeError::Payload)
    }
}

/// Outcome of one payment attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentAction {
    #[serde(default)]
    pub payment_id: Option<ExternalId>,
    #[serde(default)]
    pub organization_id: Option<ExternalId>,
    pub reservation_id: ReservationId,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub stripe_payment_intent_id: Option<String>,
    #[serde(default)]
    pub stripe_status: String,
    #[serde(default)]
    pub paid_at_utc: Option<String>,
}

impl PaymentAction {
    pub fn succeeded(&self) -> bool {
        self.stripe_status == STATUS_SUCCEEDED
    }
}

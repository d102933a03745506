//! Payment event consumer loop.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use booking::{PaymentGateway, ReservationError, ReservationLifecycleService};
use common::ReservationId;
use domain::Reservation;
use store::ReservationStore;
use tokio::sync::watch;

use crate::envelope::MessageEnvelope;
use crate::error::TransportError;
use crate::transport::EventTransport;

/// Pause after a failed receive before polling again.
const RECEIVE_BACKOFF: Duration = Duration::from_secs(1);

/// Marks reservations as paid.
#[async_trait]
pub trait PaymentConfirmer: Send + Sync {
    async fn confirm_payment(&self, id: ReservationId) -> Result<Reservation, ReservationError>;
}

#[async_trait]
impl<S, G> PaymentConfirmer for ReservationLifecycleService<S, G>
where
    S: ReservationStore,
    G: PaymentGateway,
{
    async fn confirm_payment(&self, id: ReservationId) -> Result<Reservation, ReservationError> {
        ReservationLifecycleService::confirm_payment(self, id).await
    }
}

#[async_trait]
impl<T: PaymentConfirmer + ?Sized> PaymentConfirmer for Arc<T> {
    async fn confirm_payment(&self, id: ReservationId) -> Result<Reservation, ReservationError> {
        (**self).confirm_payment(id).await
    }
}

/// What the consumer did with one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleOutcome {
    /// A successful payment confirmed its reservation.
    Confirmed,
    /// Not a successful payment action.
    Ignored,
    /// The bytes were not a valid envelope or payload.
    Undecodable,
    /// Confirmation was attempted and failed.
    Failed,
}

impl HandleOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            HandleOutcome::Confirmed => "confirmed",
            HandleOutcome::Ignored => "ignored",
            HandleOutcome::Undecodable => "undecodable",
            HandleOutcome::Failed => "failed",
        }
    }
}

/// Reads payment events and confirms the matching reservations.
///
/// Messages are handled one at a time and acknowledged after handling,
/// whatever the outcome. Nothing is retried here: a redelivered success
/// is harmless because confirming twice is a no-op.
pub struct PaymentEventConsumer<T, C>
where
    T: EventTransport,
    C: PaymentConfirmer,
{
    transport: T,
    confirmer: C,
}

impl<T, C> PaymentEventConsumer<T, C>
where
    T: EventTransport,
    C: PaymentConfirmer,
{
    pub fn new(transport: T, confirmer: C) -> Self {
        Self {
            transport,
            confirmer,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Handles one raw message.
    #[tracing::instrument(skip_all)]
    pub async fn handle_message(&self, bytes: &[u8]) -> HandleOutcome {
        let outcome = self.process(bytes).await;
        metrics::counter!("payment_events_processed_total", "outcome" => outcome.as_str())
            .increment(1);
        outcome
    }

    async fn process(&self, bytes: &[u8]) -> HandleOutcome {
        let envelope = match MessageEnvelope::decode(bytes) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(error = %e, "skipping undecodable message");
                return HandleOutcome::Undecodable;
            }
        };

        if !envelope.is_payment_action() {
            tracing::debug!(message_type = %envelope.message_type, "ignoring message");
            return HandleOutcome::Ignored;
        }

        let action = match envelope.payment_action() {
            Ok(action) => action,
            Err(e) => {
                tracing::warn!(message_id = %envelope.message_id, error = %e, "skipping undecodable payment action");
                return HandleOutcome::Undecodable;
            }
        };

        if !action.succeeded() {
            tracing::debug!(
                reservation_id = %action.reservation_id,
                stripe_status = %action.stripe_status,
                "ignoring unsuccessful payment"
            );
            return HandleOutcome::Ignored;
        }

        match self.confirmer.confirm_payment(action.reservation_id).await {
            Ok(reservation) => {
                tracing::info!(
                    reservation_id = %reservation.id,
                    status = %reservation.status,
                    "payment confirmed"
                );
                HandleOutcome::Confirmed
            }
            Err(e) => {
                tracing::error!(
                    reservation_id = %action.reservation_id,
                    error = %e,
                    "failed to confirm payment"
                );
                HandleOutcome::Failed
            }
        }
    }

    /// Runs until the transport closes or `shutdown` turns true.
    ///
    /// A message already received is handled and acknowledged before the
    /// loop stops. The transport is closed on the way out.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), TransportError> {
        tracing::info!("payment event consumer started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            let received = tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    // A dropped sender also means stop
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
                received = self.transport.receive() => received,
            };

            match received {
                Ok(Some(message)) => {
                    self.handle_message(&message.payload).await;
                    if let Err(e) = self.transport.acknowledge(&message).await {
                        tracing::warn!(
                            offset = message.offset,
                            error = %e,
                            "failed to acknowledge message, it may be redelivered"
                        );
                    }
                }
                Ok(None) => {
                    tracing::info!("transport closed");
                    break;
                }
                Err(e) => {
                    tracing::error!(error = %e, "failed to receive message");
                    tokio::select! {
                        _ = shutdown.changed() => {}
                        _ = tokio::time::sleep(RECEIVE_BACKOFF) => {}
                    }
                }
            }
        }

        self.transport.close().await?;
        tracing::info!("payment event consumer stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use chrono::{TimeZone, Utc};
    use common::{CustomerId, OrganizationId, PropertyId};
    use domain::{NewReservation, ReservationStatus};
    use serde_json::json;

    /// Confirmer that records calls and answers from a fixed result.
    #[derive(Default)]
    struct RecordingConfirmer {
        calls: Mutex<Vec<ReservationId>>,
        fail: bool,
    }

    #[async_trait]
    impl PaymentConfirmer for RecordingConfirmer {
        async fn confirm_payment(
            &self,
            id: ReservationId,
        ) -> Result<Reservation, ReservationError> {
            self.calls.lock().unwrap().push(id);
            if self.fail {
                return Err(ReservationError::ReservationNotFound(id));
            }
            let request = NewReservation::new(
                OrganizationId::new(),
                PropertyId::new(),
                CustomerId::new(),
                Utc.with_ymd_and_hms(2024, 12, 20, 15, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2024, 12, 25, 11, 0, 0).unwrap(),
            );
            let mut reservation = Reservation::create(request, Utc::now());
            reservation.id = id;
            reservation.status = ReservationStatus::Confirmed;
            Ok(reservation)
        }
    }

    fn consumer(fail: bool) -> PaymentEventConsumer<crate::ChannelTransport, RecordingConfirmer> {
        let (_, transport) = crate::channel(1);
        PaymentEventConsumer::new(
            transport,
            RecordingConfirmer {
                fail,
                ..Default::default()
            },
        )
    }

    fn event(message_type: &str, reservation_id: &str, status: &str) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "messageId": "m-1",
            "messageType": message_type,
            "occurredAt": "2024-12-01T10:00:00Z",
            "payload": {
                "paymentId": 1,
                "organizationId": 2,
                "reservationId": reservation_id,
                "amount": 500.0,
                "stripePaymentIntentId": "pi_1",
                "stripeStatus": status,
                "paidAtUtc": "2024-12-01T09:59:58Z"
            },
            "schemaVersion": 1
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn succeeded_payment_is_confirmed() {
        let consumer = consumer(false);
        let id = ReservationId::new();

        let outcome = consumer
            .handle_message(&event("PaymentAction", &id.to_string(), "succeeded"))
            .await;

        assert_eq!(outcome, HandleOutcome::Confirmed);
        assert_eq!(*consumer.confirmer.calls.lock().unwrap(), vec![id]);
    }

    #[tokio::test]
    async fn other_types_and_statuses_are_ignored() {
        let consumer = consumer(false);
        let id = ReservationId::new().to_string();

        assert_eq!(
            consumer
                .handle_message(&event("PaymentRefunded", &id, "succeeded"))
                .await,
            HandleOutcome::Ignored
        );
        assert_eq!(
            consumer
                .handle_message(&event("PaymentAction", &id, "requires_payment_method"))
                .await,
            HandleOutcome::Ignored
        );
        assert!(consumer.confirmer.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn malformed_messages_are_undecodable() {
        let consumer = consumer(false);

        assert_eq!(consumer.handle_message(b"{not json").await, HandleOutcome::Undecodable);
        assert_eq!(
            consumer
                .handle_message(&event("PaymentAction", "5", "succeeded"))
                .await,
            HandleOutcome::Undecodable
        );
        assert!(consumer.confirmer.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn numeric_reservation_id_is_acknowledged_and_skipped() {
        let (publisher, transport) = crate::channel(2);
        let consumer = PaymentEventConsumer::new(transport, RecordingConfirmer::default());
        let mut message: serde_json::Value =
            serde_json::from_slice(&event("PaymentAction", "", "succeeded")).unwrap();
        message["payload"]["reservationId"] = json!(5);

        assert_eq!(
            consumer
                .handle_message(&serde_json::to_vec(&message).unwrap())
                .await,
            HandleOutcome::Undecodable
        );

        publisher.publish_json(&message).await.unwrap();
        drop(publisher);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        consumer.run(shutdown_rx).await.unwrap();

        assert_eq!(consumer.transport().acknowledged(), vec![0]);
        assert!(consumer.confirmer.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn confirmation_failure_is_reported_not_raised() {
        let consumer = consumer(true);
        let id = ReservationId::new();

        let outcome = consumer
            .handle_message(&event("PaymentAction", &id.to_string(), "succeeded"))
            .await;

        assert_eq!(outcome, HandleOutcome::Failed);
    }
}

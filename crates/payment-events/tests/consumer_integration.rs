//! Consumer loop tests over the in-process channel transport.

use std::sync::Arc;
use std::time::Duration;

use booking::{InMemoryPaymentGateway, ReservationLifecycleService};
use chrono::{TimeZone, Utc};
use common::{CustomerId, OrganizationId, PropertyId, ReservationId};
use domain::{Money, NewReservation, Reservation, ReservationStatus};
use payment_events::{HandleOutcome, PaymentEventConsumer, channel};
use serde_json::json;
use store::{InMemoryReservationStore, ReservationStore};
use tokio::sync::watch;

type Service = ReservationLifecycleService<InMemoryReservationStore, InMemoryPaymentGateway>;

async fn setup() -> (Arc<Service>, Reservation) {
    let service = Arc::new(ReservationLifecycleService::new(
        InMemoryReservationStore::new(),
        InMemoryPaymentGateway::new(),
    ));
    let request = NewReservation::new(
        OrganizationId::new(),
        PropertyId::new(),
        CustomerId::new(),
        Utc.with_ymd_and_hms(2024, 12, 20, 15, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2024, 12, 25, 11, 0, 0).unwrap(),
    )
    .with_guests(2)
    .with_total_price(Money::from_cents(50_000));
    let reservation = service.create(request).await.unwrap();
    (service, reservation)
}

fn payment_succeeded(reservation_id: ReservationId) -> serde_json::Value {
    json!({
        "messageId": "msg-1",
        "messageType": "PaymentAction",
        "occurredAt": "2024-12-01T10:00:00Z",
        "payload": {
            "paymentId": 11,
            "organizationId": 3,
            "reservationId": reservation_id.to_string(),
            "amount": 500.0,
            "stripePaymentIntentId": "pi_abc",
            "stripeStatus": "succeeded",
            "paidAtUtc": "2024-12-01T09:59:58Z"
        },
        "schemaVersion": 1
    })
}

#[tokio::test]
async fn duplicate_delivery_confirms_once_without_error() {
    let (service, reservation) = setup().await;
    let (_, transport) = channel(4);
    let consumer = PaymentEventConsumer::new(transport, service.clone());
    let bytes = serde_json::to_vec(&payment_succeeded(reservation.id)).unwrap();

    assert_eq!(consumer.handle_message(&bytes).await, HandleOutcome::Confirmed);
    assert_eq!(consumer.handle_message(&bytes).await, HandleOutcome::Confirmed);

    let stored = service.get(reservation.id).await.unwrap();
    assert_eq!(stored.status, ReservationStatus::Confirmed);
}

#[tokio::test]
async fn unknown_reservation_fails_without_stopping() {
    let (service, _) = setup().await;
    let (_, transport) = channel(4);
    let consumer = PaymentEventConsumer::new(transport, service);
    let bytes = serde_json::to_vec(&payment_succeeded(ReservationId::new())).unwrap();

    assert_eq!(consumer.handle_message(&bytes).await, HandleOutcome::Failed);
}

#[tokio::test]
async fn run_acknowledges_every_message_until_closed() {
    let (service, reservation) = setup().await;
    let (publisher, transport) = channel(8);
    let consumer = PaymentEventConsumer::new(transport, service.clone());
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);

    publisher.publish(b"garbage".to_vec()).await.unwrap();
    publisher
        .publish_json(&json!({"messageType": "PaymentAction", "payload": {"reservationId": 5, "stripeStatus": "succeeded"}}))
        .await
        .unwrap();
    publisher
        .publish_json(&payment_succeeded(reservation.id))
        .await
        .unwrap();
    publisher
        .publish_json(&payment_succeeded(reservation.id))
        .await
        .unwrap();
    drop(publisher);

    consumer.run(shutdown_rx).await.unwrap();

    assert_eq!(consumer.transport().acknowledged(), vec![0, 1, 2, 3]);
    let stored = service.store().get_by_id(reservation.id).await.unwrap().unwrap();
    assert_eq!(stored.status, ReservationStatus::Confirmed);
}

#[tokio::test]
async fn shutdown_signal_stops_an_idle_consumer() {
    let (service, reservation) = setup().await;
    let (publisher, transport) = channel(8);
    let consumer = Arc::new(PaymentEventConsumer::new(transport, service.clone()));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let worker = {
        let consumer = consumer.clone();
        tokio::spawn(async move { consumer.run(shutdown_rx).await })
    };

    publisher
        .publish_json(&payment_succeeded(reservation.id))
        .await
        .unwrap();
    // Wait for the message to be handled before signalling
    for _ in 0..100 {
        if !publisher.acknowledged().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    shutdown_tx.send(true).unwrap();

    tokio::time::timeout(Duration::from_secs(5), worker)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(publisher.acknowledged(), vec![0]);
    assert_eq!(
        service.get(reservation.id).await.unwrap().status,
        ReservationStatus::Confirmed
    );
}

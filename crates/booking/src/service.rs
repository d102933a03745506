//! Reservation lifecycle service.

use std::future::Future;
use std::time::Instant;

use chrono::{DateTime, Utc};
use common::{CustomerId, OrganizationId, PropertyId, ReservationId};
use domain::{NewReservation, Reservation, ReservationChanges, ReservationStatus};
use store::{ReservationStore, ReservationStoreExt};

use crate::availability::AvailabilityChecker;
use crate::error::{ReservationError, Result};
use crate::payment::{PaymentGateway, PaymentReference, PaymentRequest};
use crate::timeouts::Timeouts;

/// Read-modify-write cycles attempted before a version conflict is surfaced.
const MAX_WRITE_ATTEMPTS: u32 = 3;

/// Drives reservations from creation through payment to check-out.
///
/// Creation is a two-step saga: the reservation is persisted as `pending`,
/// then the payment service is asked to start collecting. A failed payment
/// initiation leaves the pending row in place for a later retry.
pub struct ReservationLifecycleService<S, G>
where
    S: ReservationStore,
    G: PaymentGateway,
{
    store: S,
    gateway: G,
    timeouts: Timeouts,
}

impl<S, G> ReservationLifecycleService<S, G>
where
    S: ReservationStore,
    G: PaymentGateway,
{
    /// Creates a new lifecycle service with default deadlines.
    pub fn new(store: S, gateway: G) -> Self {
        Self {
            store,
            gateway,
            timeouts: Timeouts::default(),
        }
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn timeouts(&self) -> Timeouts {
        self.timeouts
    }

    /// Runs a store call under the store deadline.
    async fn store_call<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = store::Result<T>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.timeouts.store, call).await {
            Ok(result) => result.map_err(ReservationError::from),
            Err(_) => {
                tracing::warn!(operation, "store call timed out");
                Err(ReservationError::UpstreamTimeout { operation })
            }
        }
    }

    async fn load(&self, id: ReservationId) -> Result<Reservation> {
        self.store_call("store.get", self.store.get_by_id(id))
            .await?
            .ok_or(ReservationError::ReservationNotFound(id))
    }

    /// Writes a reservation read earlier and adopts the new stored version.
    async fn save(&self, reservation: &mut Reservation) -> Result<()> {
        let version = self
            .store_call("store.update", self.store.update_full(reservation))
            .await?;
        reservation.version = version;
        Ok(())
    }

    /// Whether a failed write should be retried from a fresh read.
    fn retry_after(&self, err: &ReservationError, attempt: u32) -> bool {
        let ReservationError::ConcurrentModification(id) = err else {
            return false;
        };
        metrics::counter!("reservation_write_conflicts_total").increment(1);
        if attempt >= MAX_WRITE_ATTEMPTS {
            tracing::warn!(reservation_id = %id, attempt, "giving up after repeated write conflicts");
            return false;
        }
        tracing::debug!(reservation_id = %id, attempt, "write conflict, reloading");
        true
    }

    /// Creates a reservation and starts its payment.
    ///
    /// Returns the reservation in `payment_required` with the payment
    /// reference set. If the payment service fails, the reservation stays
    /// stored as `pending` and `PaymentInitiationFailed` is returned.
    #[tracing::instrument(skip(self, request), fields(property_id = %request.property_id))]
    pub async fn create(&self, request: NewReservation) -> Result<Reservation> {
        request.validate()?;

        let stay = request.stay();
        let available = self
            .store_call(
                "store.exists_overlapping",
                AvailabilityChecker::new(&self.store).is_available(request.property_id, stay, None),
            )
            .await?;
        if !available {
            metrics::counter!("reservations_conflicts_total").increment(1);
            return Err(ReservationError::PropertyUnavailable);
        }

        let reservation = Reservation::create(request, Utc::now());
        if let Err(e) = self
            .store_call("store.insert", self.store.insert(&reservation))
            .await
        {
            if matches!(e, ReservationError::PropertyUnavailable) {
                metrics::counter!("reservations_conflicts_total").increment(1);
            }
            return Err(e);
        }
        metrics::counter!("reservations_created_total").increment(1);
        tracing::info!(reservation_id = %reservation.id, "reservation created");

        let reference = self.initiate_payment(&reservation).await?.into_inner();

        let mut attempt = 1;
        loop {
            // Re-read so a payment event that raced ahead is not overwritten
            let mut current = self.load(reservation.id).await?;
            let now = Utc::now();
            if current.status == ReservationStatus::Pending {
                current.record_payment_initiated(reference.clone(), now)?;
            } else {
                current.payment_reference = Some(reference.clone());
                current.updated_at = now;
            }

            match self.save(&mut current).await {
                Ok(()) => {
                    tracing::info!(
                        reservation_id = %current.id,
                        status = %current.status,
                        "payment initiated"
                    );
                    return Ok(current);
                }
                Err(e) if self.retry_after(&e, attempt) => attempt += 1,
                Err(e) => return Err(e),
            }
        }
    }

    async fn initiate_payment(
        &self,
        reservation: &Reservation,
    ) -> Result<PaymentReference> {
        let request = PaymentRequest {
            organization_id: reservation.organization_id,
            reservation_id: reservation.id,
            customer_id: reservation.customer_id,
            amount: reservation.total_price,
        };

        let started = Instant::now();
        let outcome = tokio::time::timeout(self.timeouts.gateway, self.gateway.initiate(request)).await;
        metrics::histogram!("payment_initiation_duration_seconds")
            .record(started.elapsed().as_secs_f64());

        match outcome {
            Ok(Ok(reference)) => Ok(reference),
            Ok(Err(e)) => {
                metrics::counter!("payment_initiation_failures_total").increment(1);
                tracing::warn!(
                    reservation_id = %reservation.id,
                    error = %e,
                    "payment initiation failed, reservation left pending"
                );
                Err(ReservationError::PaymentInitiationFailed(e))
            }
            Err(_) => {
                metrics::counter!("payment_initiation_failures_total").increment(1);
                tracing::warn!(
                    reservation_id = %reservation.id,
                    "payment initiation timed out, reservation left pending"
                );
                Err(ReservationError::UpstreamTimeout {
                    operation: "payment.initiate",
                })
            }
        }
    }

    /// Gets a reservation by ID.
    #[tracing::instrument(skip(self))]
    pub async fn get(&self, id: ReservationId) -> Result<Reservation> {
        self.load(id).await
    }

    /// Lists every reservation, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<Reservation>> {
        self.store_call("store.query", self.store.list()).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn by_customer(&self, customer_id: CustomerId) -> Result<Vec<Reservation>> {
        self.store_call("store.query", self.store.list_by_customer(customer_id))
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn by_property(&self, property_id: PropertyId) -> Result<Vec<Reservation>> {
        self.store_call("store.query", self.store.list_by_property(property_id))
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn by_organization(
        &self,
        organization_id: OrganizationId,
    ) -> Result<Vec<Reservation>> {
        self.store_call(
            "store.query",
            self.store.list_by_organization(organization_id),
        )
        .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn by_status(&self, status: ReservationStatus) -> Result<Vec<Reservation>> {
        self.store_call("store.query", self.store.list_by_status(status))
            .await
    }

    /// Lists reservations whose check-in falls within `[start, end]`.
    #[tracing::instrument(skip(self))]
    pub async fn by_date_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Reservation>> {
        self.store_call("store.query", self.store.list_by_date_range(start, end))
            .await
    }

    /// Lists live reservations checking in after now, earliest first.
    #[tracing::instrument(skip(self))]
    pub async fn upcoming(&self) -> Result<Vec<Reservation>> {
        self.store_call("store.query", self.store.list_upcoming(Utc::now()))
            .await
    }

    /// Replaces the dates, guests, price and free-form maps of a reservation.
    #[tracing::instrument(skip(self, changes))]
    pub async fn update(&self, id: ReservationId, changes: ReservationChanges) -> Result<Reservation> {
        changes.validate()?;

        let mut attempt = 1;
        loop {
            let mut reservation = self.load(id).await?;
            if reservation.is_locked() {
                return Err(ReservationError::ReservationLocked(id));
            }

            if reservation.is_active() {
                let available = self
                    .store_call(
                        "store.exists_overlapping",
                        AvailabilityChecker::new(&self.store).is_available(
                            reservation.property_id,
                            changes.stay(),
                            Some(id),
                        ),
                    )
                    .await?;
                if !available {
                    metrics::counter!("reservations_conflicts_total").increment(1);
                    return Err(ReservationError::PropertyUnavailable);
                }
            }

            reservation.apply_changes(changes.clone(), Utc::now());
            match self.save(&mut reservation).await {
                Ok(()) => {
                    tracing::info!(reservation_id = %id, "reservation updated");
                    return Ok(reservation);
                }
                Err(e) if self.retry_after(&e, attempt) => attempt += 1,
                Err(e) => return Err(e),
            }
        }
    }

    /// Permanently removes a reservation unless it is completed.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, id: ReservationId) -> Result<()> {
        let reservation = self.load(id).await?;
        if reservation.status == ReservationStatus::Completed {
            return Err(ReservationError::CannotDeleteCompleted(id));
        }

        self.store_call("store.delete", self.store.delete(id))
            .await?;
        tracing::info!(reservation_id = %id, "reservation deleted");
        Ok(())
    }

    /// Moves a reservation to the status named by `status`.
    #[tracing::instrument(skip(self))]
    pub async fn update_status(&self, id: ReservationId, status: &str) -> Result<Reservation> {
        let target: ReservationStatus = status.parse()?;
        self.transition(id, target).await.map(|(reservation, _)| reservation)
    }

    /// Applies a state machine move and persists it.
    ///
    /// Returns the record and whether anything changed. A move to the current
    /// status succeeds without a write. A write that lost a race is retried
    /// against the fresh record, so the move is judged on the latest status.
    async fn transition(
        &self,
        id: ReservationId,
        target: ReservationStatus,
    ) -> Result<(Reservation, bool)> {
        let mut attempt = 1;
        loop {
            let mut reservation = self.load(id).await?;
            let from = reservation.status;

            let changed = reservation.transition_to(target, Utc::now())?;
            if !changed {
                return Ok((reservation, false));
            }

            match self.save(&mut reservation).await {
                Ok(()) => {
                    metrics::counter!("reservation_status_transitions_total", "to" => target.as_str())
                        .increment(1);
                    tracing::info!(reservation_id = %id, %from, to = %target, "reservation status changed");
                    return Ok((reservation, true));
                }
                Err(e) if self.retry_after(&e, attempt) => attempt += 1,
                Err(e) => return Err(e),
            }
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn cancel(&self, id: ReservationId) -> Result<Reservation> {
        self.update_status(id, ReservationStatus::Cancelled.as_str())
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn confirm(&self, id: ReservationId) -> Result<Reservation> {
        self.update_status(id, ReservationStatus::Confirmed.as_str())
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn check_in(&self, id: ReservationId) -> Result<Reservation> {
        self.update_status(id, ReservationStatus::CheckedIn.as_str())
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn check_out(&self, id: ReservationId) -> Result<Reservation> {
        self.update_status(id, ReservationStatus::CheckedOut.as_str())
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn complete(&self, id: ReservationId) -> Result<Reservation> {
        self.update_status(id, ReservationStatus::Completed.as_str())
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn reject(&self, id: ReservationId) -> Result<Reservation> {
        self.update_status(id, ReservationStatus::Rejected.as_str())
            .await
    }

    /// Marks a reservation as paid.
    ///
    /// Safe to call repeatedly: an already confirmed reservation is returned
    /// unchanged.
    #[tracing::instrument(skip(self))]
    pub async fn confirm_payment(&self, id: ReservationId) -> Result<Reservation> {
        let (reservation, changed) = self.transition(id, ReservationStatus::Confirmed).await?;
        if changed {
            metrics::counter!("payments_confirmed_total").increment(1);
        }
        Ok(reservation)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::payment::InMemoryPaymentGateway;
    use chrono::{Duration as ChronoDuration, TimeZone};
    use domain::Money;
    use store::InMemoryReservationStore;

    type TestService = ReservationLifecycleService<InMemoryReservationStore, InMemoryPaymentGateway>;

    fn setup() -> (TestService, InMemoryReservationStore, InMemoryPaymentGateway) {
        let store = InMemoryReservationStore::new();
        let gateway = InMemoryPaymentGateway::new();
        let service = ReservationLifecycleService::new(store.clone(), gateway.clone());
        (service, store, gateway)
    }

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 6, d, 15, 0, 0).unwrap()
    }

    fn request(property_id: PropertyId, from: u32, to: u32) -> NewReservation {
        NewReservation::new(
            OrganizationId::new(),
            property_id,
            CustomerId::new(),
            day(from),
            day(to),
        )
        .with_guests(2)
        .with_total_price(Money::from_cents(50_000))
    }

    async fn seeded(store: &InMemoryReservationStore, status: ReservationStatus) -> Reservation {
        let mut reservation = Reservation::create(request(PropertyId::new(), 10, 12), Utc::now());
        reservation.status = status;
        store.insert(&reservation).await.unwrap();
        reservation
    }

    #[tokio::test]
    async fn create_initiates_payment() {
        let (service, store, gateway) = setup();

        let reservation = service.create(request(PropertyId::new(), 10, 15)).await.unwrap();

        assert_eq!(reservation.status, ReservationStatus::PaymentRequired);
        assert_eq!(reservation.payment_reference.as_deref(), Some("PAY-0001"));
        let sent = gateway.requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].reservation_id, reservation.id);
        assert_eq!(sent[0].amount, Money::from_cents(50_000));
        assert_eq!(store.get_by_id(reservation.id).await.unwrap(), Some(reservation));
    }

    #[tokio::test]
    async fn invalid_request_writes_nothing() {
        let (service, store, gateway) = setup();

        let result = service
            .create(request(PropertyId::new(), 10, 15).with_guests(0))
            .await;

        assert!(matches!(result, Err(ReservationError::Validation(ref e)) if e.field == "guests"));
        assert_eq!(store.reservation_count().await, 0);
        assert_eq!(gateway.request_count(), 0);
    }

    #[tokio::test]
    async fn payment_failure_leaves_pending_row() {
        let (service, store, gateway) = setup();
        gateway.set_fail_on_initiate(true);

        let result = service.create(request(PropertyId::new(), 10, 15)).await;

        assert!(matches!(result, Err(ReservationError::PaymentInitiationFailed(_))));
        let rows = store.list().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, ReservationStatus::Pending);
        assert!(rows[0].payment_reference.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_gateway_times_out() {
        let (service, store, gateway) = setup();
        let service = service.with_timeouts(Timeouts::new(
            Duration::from_secs(5),
            Duration::from_millis(100),
        ));
        gateway.set_delay(Some(Duration::from_secs(1)));

        let result = service.create(request(PropertyId::new(), 10, 15)).await;

        assert!(matches!(
            result,
            Err(ReservationError::UpstreamTimeout {
                operation: "payment.initiate"
            })
        ));
        assert_eq!(store.reservation_count().await, 1);
    }

    #[tokio::test]
    async fn update_excludes_itself_and_bumps_timestamp() {
        let (service, _, _) = setup();
        let property = PropertyId::new();
        let created = service.create(request(property, 10, 15)).await.unwrap();

        let changes = ReservationChanges::new(day(11), day(16)).with_guests(3);
        let updated = service.update(created.id, changes).await.unwrap();

        assert_eq!(updated.check_in, day(11));
        assert_eq!(updated.guests, 3);
        assert!(updated.updated_at >= created.updated_at);
        assert_eq!(updated.created_at, created.created_at);
    }

    #[tokio::test]
    async fn update_into_another_stay_conflicts() {
        let (service, _, _) = setup();
        let property = PropertyId::new();
        service.create(request(property, 10, 15)).await.unwrap();
        let later = service.create(request(property, 20, 25)).await.unwrap();

        let result = service
            .update(later.id, ReservationChanges::new(day(14), day(21)))
            .await;

        assert!(matches!(result, Err(ReservationError::PropertyUnavailable)));
    }

    #[tokio::test]
    async fn terminal_reservations_are_locked() {
        let (service, store, _) = setup();
        let reservation = seeded(&store, ReservationStatus::Cancelled).await;

        let result = service
            .update(reservation.id, ReservationChanges::new(day(1), day(3)))
            .await;

        assert!(matches!(result, Err(ReservationError::ReservationLocked(id)) if id == reservation.id));
    }

    #[tokio::test]
    async fn unknown_ids_are_not_found() {
        let (service, _, _) = setup();
        let id = ReservationId::new();

        assert!(matches!(service.get(id).await, Err(ReservationError::ReservationNotFound(_))));
        assert!(matches!(service.delete(id).await, Err(ReservationError::ReservationNotFound(_))));
        assert!(matches!(
            service.confirm_payment(id).await,
            Err(ReservationError::ReservationNotFound(_))
        ));
    }

    #[tokio::test]
    async fn completed_reservations_cannot_be_deleted() {
        let (service, store, _) = setup();
        let completed = seeded(&store, ReservationStatus::Completed).await;
        let cancelled = seeded(&store, ReservationStatus::Cancelled).await;

        assert!(matches!(
            service.delete(completed.id).await,
            Err(ReservationError::CannotDeleteCompleted(_))
        ));
        service.delete(cancelled.id).await.unwrap();
        assert!(store.get_by_id(cancelled.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unknown_status_string_is_rejected() {
        let (service, store, _) = setup();
        let reservation = seeded(&store, ReservationStatus::Pending).await;

        let result = service.update_status(reservation.id, "archived").await;
        assert!(matches!(result, Err(ReservationError::InvalidStatusValue(ref s)) if s == "archived"));
    }

    #[tokio::test]
    async fn illegal_transition_leaves_store_untouched() {
        let (service, store, _) = setup();
        let reservation = seeded(&store, ReservationStatus::Pending).await;

        let result = service.check_in(reservation.id).await;

        assert!(matches!(
            result,
            Err(ReservationError::InvalidTransition {
                from: ReservationStatus::Pending,
                to: ReservationStatus::CheckedIn
            })
        ));
        assert_eq!(store.get_by_id(reservation.id).await.unwrap(), Some(reservation));
    }

    #[tokio::test]
    async fn same_status_skips_the_write() {
        let (service, store, _) = setup();
        let reservation = seeded(&store, ReservationStatus::Confirmed).await;

        let returned = service.confirm(reservation.id).await.unwrap();

        assert_eq!(returned, reservation);
        assert_eq!(
            store.get_by_id(reservation.id).await.unwrap().unwrap().updated_at,
            reservation.updated_at
        );
    }

    #[tokio::test]
    async fn wrappers_walk_the_happy_path() {
        let (service, _, _) = setup();
        let created = service.create(request(PropertyId::new(), 10, 15)).await.unwrap();

        service.confirm_payment(created.id).await.unwrap();
        service.check_in(created.id).await.unwrap();
        service.check_out(created.id).await.unwrap();
        let done = service.complete(created.id).await.unwrap();

        assert_eq!(done.status, ReservationStatus::Completed);
        assert!(matches!(
            service.cancel(created.id).await,
            Err(ReservationError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn reject_frees_the_dates() {
        let (service, store, _) = setup();
        let property = PropertyId::new();
        let pending = Reservation::create(request(property, 10, 15), Utc::now());
        store.insert(&pending).await.unwrap();

        service.reject(pending.id).await.unwrap();
        assert!(service.create(request(property, 11, 14)).await.is_ok());
    }

    #[tokio::test]
    async fn read_queries_delegate_to_store() {
        let (service, _, _) = setup();
        let property = PropertyId::new();
        let first = service.create(request(property, 10, 12)).await.unwrap();
        let second = service.create(request(property, 20, 22)).await.unwrap();

        assert_eq!(service.list().await.unwrap().len(), 2);
        assert_eq!(service.by_property(property).await.unwrap()[0].id, second.id);
        assert_eq!(service.by_customer(first.customer_id).await.unwrap()[0].id, first.id);
        assert_eq!(
            service
                .by_organization(second.organization_id)
                .await
                .unwrap()
                .len(),
            1
        );
        assert_eq!(
            service
                .by_status(ReservationStatus::PaymentRequired)
                .await
                .unwrap()
                .len(),
            2
        );
        let range = service
            .by_date_range(day(9), day(10) + ChronoDuration::hours(1))
            .await
            .unwrap();
        assert_eq!(range.len(), 1);
        assert_eq!(range[0].id, first.id);
        assert_eq!(service.upcoming().await.unwrap().len(), 2);
    }
}
